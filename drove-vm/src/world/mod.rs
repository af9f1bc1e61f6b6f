//! # World Registry Interface
//!
//! The engine does not store agents. Everything it knows about them comes
//! through the [`World`] trait: per-kind variable tables, domain-checked
//! variable access, liveness, creation and death, and the main random
//! stream. [`SimpleWorld`] is an in-memory implementation used by tests and
//! the CLI.

mod simple;

pub use simple::{SimpleWorld, WorldSpec};

use crate::agent::{AgentKind, AgentRef, AgentSet};
use crate::error::{self, Result};
use crate::random::{RandomStream, SharedRandom};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Constraint a variable slot places on its values
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Domain {
    #[default]
    Any,
    Number,
    Range { min: f64, max: f64 },
    Boolean,
    /// Numbers, wrapped into `[0, 140)`
    Color,
    /// An agent of the given kind, or nobody
    Agent { kind: AgentKind },
}

impl Domain {
    /// Check `value` for the slot named `name`, returning the value to store.
    ///
    /// Fails with an agent-validation error describing the violated
    /// constraint.
    pub fn check(&self, name: &str, value: Value) -> Result<Value> {
        match (self, &value) {
            (Domain::Any, _) => Ok(value),
            (Domain::Number, Value::Number(_)) => Ok(value),
            (Domain::Range { min, max }, Value::Number(n)) => {
                if !n.is_finite() {
                    Err(error::domain_violation(name, format!("{} is not a finite number", n)))
                } else if n < min || n > max {
                    Err(error::domain_violation(
                        name,
                        format!("{} is out of range [{}, {}]", Value::Number(*n), min, max),
                    ))
                } else {
                    Ok(value)
                }
            }
            (Domain::Boolean, Value::Boolean(_)) => Ok(value),
            (Domain::Color, Value::Number(n)) => Ok(Value::Number(wrap_color(*n))),
            (Domain::Agent { .. }, Value::Nobody) => Ok(value),
            (Domain::Agent { kind }, Value::Agent(agent)) if agent.kind == *kind => Ok(value),
            (Domain::Agent { kind }, _) => Err(error::domain_violation(
                name,
                format!("expected a {} but got {}", kind, value.type_name()),
            )),
            (Domain::Boolean, _) => Err(error::domain_violation(
                name,
                format!("expected TRUE/FALSE but got {}", value.type_name()),
            )),
            (Domain::Number | Domain::Range { .. } | Domain::Color, _) => Err(
                error::domain_violation(name, format!("expected a number but got {}", value.type_name())),
            ),
        }
    }
}

fn wrap_color(c: f64) -> f64 {
    let wrapped = c % 140.0;
    if wrapped < 0.0 {
        wrapped + 140.0
    } else {
        wrapped
    }
}

/// A declared variable slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    #[serde(default)]
    pub domain: Domain,
    #[serde(default)]
    pub initial: Value,
}

impl VariableDef {
    pub fn new(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
            initial: Value::Number(0.0),
        }
    }

    pub fn with_initial(mut self, initial: Value) -> Self {
        self.initial = initial;
        self
    }
}

/// Parameters of the spring layout primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    pub spring_constant: f64,
    pub spring_length: f64,
    pub repulsion_constant: f64,
}

/// The world registry as seen by the engine
pub trait World {
    /// Variable table of a kind, indexed by slot
    fn variables(&self, kind: AgentKind) -> &[VariableDef];

    /// Whether the agent still exists
    fn is_alive(&self, agent: AgentRef) -> bool;

    /// Read a slot. Fails if the agent is dead or the slot does not exist.
    fn get_variable(&self, agent: AgentRef, slot: usize) -> Result<Value>;

    /// Write a slot after checking its domain. On failure the prior value is
    /// left unchanged.
    fn set_variable(&mut self, agent: AgentRef, slot: usize, value: Value) -> Result<()>;

    /// Every live agent of a kind
    fn agents(&self, kind: AgentKind) -> AgentSet;

    /// The patch a turtle stands on
    fn patch_here(&self, turtle: AgentRef) -> Result<AgentRef>;

    /// Create `count` turtles, drawing any random initial state from `random`
    fn create_turtles(&mut self, count: usize, random: &mut RandomStream) -> Result<AgentSet>;

    /// Remove an agent from the world
    fn kill(&mut self, agent: AgentRef) -> Result<()>;

    /// The world's main random stream
    fn main_random(&self) -> SharedRandom;

    /// Spring layout over `nodes` connected by `links`.
    ///
    /// Returns every `(turtle, slot)` it wrote so the caller can notify.
    fn layout_spring(
        &mut self,
        nodes: &AgentSet,
        links: &AgentSet,
        params: SpringParams,
        random: &mut RandomStream,
    ) -> Result<Vec<(AgentRef, usize)>> {
        let _ = (nodes, links, params, random);
        Err(error::unsupported("layout-spring is not available in this world"))
    }

    /// Name of a slot, falling back to its index
    fn variable_name(&self, kind: AgentKind, slot: usize) -> String {
        self.variables(kind)
            .get(slot)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| slot.to_string())
    }

    /// Resolve a slot index by name
    fn variable_index(&self, kind: AgentKind, name: &str) -> Option<usize> {
        self.variables(kind)
            .iter()
            .position(|def| def.name.eq_ignore_ascii_case(name))
    }
}
