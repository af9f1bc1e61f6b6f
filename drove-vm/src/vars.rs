//! Agent variable access.
//!
//! The world validates slots and domains; this layer picks the agent a
//! primitive addresses and fires the change notification after every
//! successful write. A failed write notifies nobody and leaves the prior
//! value in place.

use crate::agent::{AgentKind, AgentRef};
use crate::error::{self, Result};
use crate::notify::Notifier;
use crate::value::Value;
use crate::world::World;

/// Read a variable slot
pub fn get(world: &dyn World, agent: AgentRef, slot: usize) -> Result<Value> {
    world.get_variable(agent, slot)
}

/// Write a variable slot and notify on success
pub fn set(
    world: &mut dyn World,
    notifier: &mut dyn Notifier,
    agent: AgentRef,
    slot: usize,
    value: Value,
) -> Result<()> {
    world.set_variable(agent, slot, value)?;
    let stored = world.get_variable(agent, slot)?;
    notifier.variable_changed(agent, slot, &stored);
    Ok(())
}

/// The agent whose `kind` variables `running` addresses.
///
/// Globals are reachable from everywhere and turtles reach the patch they
/// stand on.
pub fn target(world: &dyn World, running: AgentRef, kind: AgentKind, primitive: &str) -> Result<AgentRef> {
    match (kind, running.kind) {
        (AgentKind::Observer, _) => Ok(AgentRef::OBSERVER),
        (wanted, actual) if wanted == actual => Ok(running),
        (AgentKind::Patch, AgentKind::Turtle) => world.patch_here(running),
        _ => Err(error::wrong_agent(primitive, running.kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::notify::RecordingNotifier;
    use crate::world::{Domain, SimpleWorld, VariableDef, WorldSpec};
    use proptest::prelude::*;

    const PCOLOR: usize = 3;

    #[test]
    fn test_set_notifies_stored_value() {
        let mut world = SimpleWorld::new();
        let mut notifier = RecordingNotifier::new();

        set(&mut world, &mut notifier, AgentRef::patch(0), PCOLOR, Value::Number(145.0)).unwrap();

        assert_eq!(get(&world, AgentRef::patch(0), PCOLOR).unwrap(), Value::Number(5.0));
        assert_eq!(notifier.changes, vec![(AgentRef::patch(0), PCOLOR, Value::Number(5.0))]);
    }

    #[test]
    fn test_failed_set_is_silent() {
        let mut world = SimpleWorld::new();
        let mut notifier = RecordingNotifier::new();

        let err = set(&mut world, &mut notifier, AgentRef::patch(0), PCOLOR, Value::from("red")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AgentValidation);
        assert!(notifier.changes.is_empty());
        assert_eq!(get(&world, AgentRef::patch(0), PCOLOR).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_target_resolution() {
        let world = SimpleWorld::from_spec(&WorldSpec {
            turtles: 1,
            ..WorldSpec::default()
        })
        .unwrap();
        let turtle = AgentRef::turtle(0);

        assert_eq!(target(&world, turtle, AgentKind::Observer, "set").unwrap(), AgentRef::OBSERVER);
        assert_eq!(target(&world, turtle, AgentKind::Turtle, "set").unwrap(), turtle);
        assert_eq!(target(&world, turtle, AgentKind::Patch, "set").unwrap().kind, AgentKind::Patch);

        let err = target(&world, AgentRef::patch(0), AgentKind::Turtle, "set").unwrap_err();
        assert!(err.kind().is_agent_validation());
    }

    fn ranged_world() -> SimpleWorld {
        SimpleWorld::from_spec(&WorldSpec {
            patches_own: vec![VariableDef::new("level", Domain::Range { min: 0.0, max: 10.0 })],
            ..WorldSpec::default()
        })
        .unwrap()
    }

    proptest! {
        #[test]
        fn prop_set_then_get(prior in 0.0f64..=10.0, v in -20.0f64..20.0) {
            let mut world = ranged_world();
            let mut notifier = RecordingNotifier::new();
            let patch = AgentRef::patch(4);
            let level = 4;
            set(&mut world, &mut notifier, patch, level, Value::Number(prior)).unwrap();

            let result = set(&mut world, &mut notifier, patch, level, Value::Number(v));
            if (0.0..=10.0).contains(&v) {
                prop_assert!(result.is_ok());
                prop_assert_eq!(get(&world, patch, level).unwrap(), Value::Number(v));
            } else {
                prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::AgentValidation);
                prop_assert_eq!(get(&world, patch, level).unwrap(), Value::Number(prior));
                prop_assert_eq!(notifier.changes.len(), 1);
            }
        }
    }
}
