//! In-memory world registry.
//!
//! Patches form a `width` x `height` grid with `pxcor` in `[0, width)` and
//! `pycor` in `[0, height)`. Turtles keep `xcor`/`ycor` in their first two
//! slots. Dead agents keep their slots but refuse every access.

use super::{Domain, SpringParams, VariableDef, World};
use crate::agent::{AgentKind, AgentRef, AgentSet};
use crate::error::{self, Result};
use crate::random::{RandomStream, SharedRandom};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

const XCOR: usize = 0;
const YCOR: usize = 1;
const WHO: usize = 2;
const END1: usize = 0;
const END2: usize = 1;

/// Declarative description of a [`SimpleWorld`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSpec {
    #[serde(default)]
    pub globals: Vec<VariableDef>,
    #[serde(default)]
    pub turtles_own: Vec<VariableDef>,
    #[serde(default)]
    pub patches_own: Vec<VariableDef>,
    #[serde(default)]
    pub links_own: Vec<VariableDef>,
    #[serde(default = "default_extent")]
    pub width: usize,
    #[serde(default = "default_extent")]
    pub height: usize,
    /// Turtles created before the run starts
    #[serde(default)]
    pub turtles: usize,
    /// Links between initial turtles, as pairs of `who` numbers
    #[serde(default)]
    pub links: Vec<(usize, usize)>,
    #[serde(default)]
    pub seed: u64,
}

fn default_extent() -> usize {
    3
}

impl Default for WorldSpec {
    fn default() -> Self {
        Self {
            globals: Vec::new(),
            turtles_own: Vec::new(),
            patches_own: Vec::new(),
            links_own: Vec::new(),
            width: default_extent(),
            height: default_extent(),
            turtles: 0,
            links: Vec::new(),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Slots {
    vars: Vec<Value>,
    alive: bool,
}

/// In-memory [`World`] implementation
#[derive(Debug)]
pub struct SimpleWorld {
    tables: [Vec<VariableDef>; 4],
    agents: [Vec<Slots>; 4],
    width: usize,
    height: usize,
    main_random: SharedRandom,
}

fn kind_index(kind: AgentKind) -> usize {
    match kind {
        AgentKind::Observer => 0,
        AgentKind::Turtle => 1,
        AgentKind::Patch => 2,
        AgentKind::Link => 3,
    }
}

impl SimpleWorld {
    /// Build a world with the built-in variables followed by the declared ones
    pub fn from_spec(spec: &WorldSpec) -> Result<Self> {
        if spec.width == 0 || spec.height == 0 {
            return Err(error::config_invalid("world must have at least one patch"));
        }

        let mut world = Self::build(spec);

        if spec.turtles > 0 {
            let random = Rc::clone(&world.main_random);
            world.create_turtles(spec.turtles, &mut random.borrow_mut())?;
        }

        for &(a, b) in &spec.links {
            world.create_link(AgentRef::turtle(a), AgentRef::turtle(b))?;
        }

        Ok(world)
    }

    /// A 3x3 world with only built-in variables
    pub fn new() -> Self {
        Self::build(&WorldSpec::default())
    }

    fn build(spec: &WorldSpec) -> Self {
        let max_x = spec.width as f64 - 0.5;
        let max_y = spec.height as f64 - 0.5;

        let mut turtle_vars = vec![
            VariableDef::new("xcor", Domain::Range { min: -0.5, max: max_x }),
            VariableDef::new("ycor", Domain::Range { min: -0.5, max: max_y }),
            VariableDef::new("who", Domain::Number),
            VariableDef::new("color", Domain::Color),
            VariableDef::new("heading", Domain::Range { min: 0.0, max: 360.0 }),
        ];
        turtle_vars.extend(spec.turtles_own.iter().cloned());

        let mut patch_vars = vec![
            VariableDef::new("pxcor", Domain::Number),
            VariableDef::new("pycor", Domain::Number),
            VariableDef::new("plabel", Domain::Any).with_initial(Value::String(String::new())),
            VariableDef::new("pcolor", Domain::Color),
        ];
        patch_vars.extend(spec.patches_own.iter().cloned());

        let mut link_vars = vec![
            VariableDef::new("end1", Domain::Agent { kind: AgentKind::Turtle }).with_initial(Value::Nobody),
            VariableDef::new("end2", Domain::Agent { kind: AgentKind::Turtle }).with_initial(Value::Nobody),
            VariableDef::new("color", Domain::Color).with_initial(Value::Number(5.0)),
        ];
        link_vars.extend(spec.links_own.iter().cloned());

        let mut world = Self {
            tables: [spec.globals.clone(), turtle_vars, patch_vars, link_vars],
            agents: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
            width: spec.width,
            height: spec.height,
            main_random: RandomStream::shared(spec.seed),
        };

        let observer = world.fresh_slots(AgentKind::Observer);
        world.agents[kind_index(AgentKind::Observer)].push(observer);

        for id in 0..spec.width * spec.height {
            let mut slots = world.fresh_slots(AgentKind::Patch);
            slots.vars[0] = Value::Number((id % spec.width) as f64);
            slots.vars[1] = Value::Number((id / spec.width) as f64);
            world.agents[kind_index(AgentKind::Patch)].push(slots);
        }

        world
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Connect two live turtles
    pub fn create_link(&mut self, end1: AgentRef, end2: AgentRef) -> Result<AgentRef> {
        for end in [end1, end2] {
            if end.kind != AgentKind::Turtle || !self.is_alive(end) {
                return Err(error::agent_validation(format!("cannot link {}", end)));
            }
        }
        let id = self.agents[kind_index(AgentKind::Link)].len();
        let mut slots = self.fresh_slots(AgentKind::Link);
        slots.vars[END1] = Value::Agent(end1);
        slots.vars[END2] = Value::Agent(end2);
        self.agents[kind_index(AgentKind::Link)].push(slots);
        Ok(AgentRef::link(id))
    }

    /// JSON view of every live agent, keyed by variable name
    pub fn snapshot(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for kind in AgentKind::ALL {
            let table = &self.tables[kind_index(kind)];
            let rows: Vec<serde_json::Value> = self.agents[kind_index(kind)]
                .iter()
                .filter(|slots| slots.alive)
                .map(|slots| {
                    let row: serde_json::Map<String, serde_json::Value> = table
                        .iter()
                        .zip(&slots.vars)
                        .map(|(def, value)| {
                            (def.name.clone(), serde_json::to_value(value).unwrap_or_default())
                        })
                        .collect();
                    serde_json::Value::Object(row)
                })
                .collect();

            if kind == AgentKind::Observer {
                out.insert("globals".to_string(), rows.into_iter().next().unwrap_or_default());
            } else {
                out.insert(kind.plural().to_string(), serde_json::Value::Array(rows));
            }
        }
        serde_json::Value::Object(out)
    }

    fn fresh_slots(&self, kind: AgentKind) -> Slots {
        Slots {
            vars: self.tables[kind_index(kind)].iter().map(|def| def.initial.clone()).collect(),
            alive: true,
        }
    }

    fn slots(&self, agent: AgentRef) -> Result<&Slots> {
        let slots = self.agents[kind_index(agent.kind)]
            .get(agent.id)
            .ok_or_else(|| error::agent_validation(format!("{} does not exist", agent)))?;
        if !slots.alive {
            return Err(error::agent_dead(agent.to_string()));
        }
        Ok(slots)
    }

    fn slots_mut(&mut self, agent: AgentRef) -> Result<&mut Slots> {
        let slots = self.agents[kind_index(agent.kind)]
            .get_mut(agent.id)
            .ok_or_else(|| error::agent_validation(format!("{} does not exist", agent)))?;
        if !slots.alive {
            return Err(error::agent_dead(agent.to_string()));
        }
        Ok(slots)
    }

    fn position(&self, turtle: AgentRef) -> Result<(f64, f64)> {
        let slots = self.slots(turtle)?;
        let x = slots.vars[XCOR].as_number().unwrap_or(0.0);
        let y = slots.vars[YCOR].as_number().unwrap_or(0.0);
        Ok((x, y))
    }

    fn clamp_x(&self, x: f64) -> f64 {
        x.clamp(-0.5, self.width as f64 - 0.5)
    }

    fn clamp_y(&self, y: f64) -> f64 {
        y.clamp(-0.5, self.height as f64 - 0.5)
    }
}

impl Default for SimpleWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl World for SimpleWorld {
    fn variables(&self, kind: AgentKind) -> &[VariableDef] {
        &self.tables[kind_index(kind)]
    }

    fn is_alive(&self, agent: AgentRef) -> bool {
        self.agents[kind_index(agent.kind)]
            .get(agent.id)
            .is_some_and(|slots| slots.alive)
    }

    fn get_variable(&self, agent: AgentRef, slot: usize) -> Result<Value> {
        let slots = self.slots(agent)?;
        slots
            .vars
            .get(slot)
            .cloned()
            .ok_or_else(|| error::slot_out_of_range(agent.kind, slot))
    }

    fn set_variable(&mut self, agent: AgentRef, slot: usize, value: Value) -> Result<()> {
        let def = self.tables[kind_index(agent.kind)]
            .get(slot)
            .ok_or_else(|| error::slot_out_of_range(agent.kind, slot))?;
        if agent.kind == AgentKind::Turtle && slot == WHO {
            return Err(error::agent_validation("you can't change a turtle's ID number"));
        }
        self.slots(agent)?;
        let value = def.domain.check(&def.name, value)?;
        let slots = self.slots_mut(agent)?;
        slots.vars[slot] = value;
        Ok(())
    }

    fn agents(&self, kind: AgentKind) -> AgentSet {
        if kind == AgentKind::Observer {
            return AgentSet::from_agent(AgentRef::OBSERVER);
        }
        let mut builder = AgentSet::builder(kind);
        for (id, slots) in self.agents[kind_index(kind)].iter().enumerate() {
            if slots.alive {
                builder.add(AgentRef::new(kind, id));
            }
        }
        builder.build()
    }

    fn patch_here(&self, turtle: AgentRef) -> Result<AgentRef> {
        let (x, y) = self.position(turtle)?;
        let px = (x.round().max(0.0) as usize).min(self.width - 1);
        let py = (y.round().max(0.0) as usize).min(self.height - 1);
        Ok(AgentRef::patch(py * self.width + px))
    }

    fn create_turtles(&mut self, count: usize, random: &mut RandomStream) -> Result<AgentSet> {
        let mut builder = AgentSet::builder(AgentKind::Turtle).ordered();
        for _ in 0..count {
            let id = self.agents[kind_index(AgentKind::Turtle)].len();
            let mut slots = self.fresh_slots(AgentKind::Turtle);
            slots.vars[WHO] = Value::Number(id as f64);
            slots.vars[3] = Value::Number(5.0 + 10.0 * random.next_int(14) as f64);
            slots.vars[4] = Value::Number(random.next_int(360) as f64);
            self.agents[kind_index(AgentKind::Turtle)].push(slots);
            builder.add(AgentRef::turtle(id));
        }
        Ok(builder.build())
    }

    fn kill(&mut self, agent: AgentRef) -> Result<()> {
        match agent.kind {
            AgentKind::Observer => return Err(error::agent_validation("the observer can't die")),
            AgentKind::Patch => return Err(error::agent_validation("patches can't die")),
            _ => {}
        }
        self.slots_mut(agent)?.alive = false;

        if agent.kind == AgentKind::Turtle {
            let end = Value::Agent(agent);
            for link in self.agents[kind_index(AgentKind::Link)].iter_mut() {
                if link.vars[END1] == end || link.vars[END2] == end {
                    link.alive = false;
                }
            }
        }
        Ok(())
    }

    fn main_random(&self) -> SharedRandom {
        Rc::clone(&self.main_random)
    }

    fn layout_spring(
        &mut self,
        nodes: &AgentSet,
        links: &AgentSet,
        params: SpringParams,
        random: &mut RandomStream,
    ) -> Result<Vec<(AgentRef, usize)>> {
        let mut moves: Vec<(AgentRef, f64, f64)> = Vec::new();

        for link in links.iter() {
            let (a, b) = {
                let slots = self.slots(link)?;
                match (slots.vars[END1].as_agent(), slots.vars[END2].as_agent()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => continue,
                }
            };
            if !nodes.contains(a) || !nodes.contains(b) {
                continue;
            }
            let (ax, ay) = self.position(a)?;
            let (bx, by) = self.position(b)?;
            let (mut dx, mut dy) = (bx - ax, by - ay);
            let mut dist = (dx * dx + dy * dy).sqrt();
            if dist == 0.0 {
                let angle = random.next_double() * std::f64::consts::TAU;
                (dx, dy, dist) = (angle.cos(), angle.sin(), 1.0);
            }
            let force = params.spring_constant * (dist - params.spring_length) / 2.0;
            moves.push((a, force * dx / dist, force * dy / dist));
            moves.push((b, -force * dx / dist, -force * dy / dist));
        }

        let members: Vec<AgentRef> = nodes.iter().collect();
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                let (ax, ay) = self.position(a)?;
                let (bx, by) = self.position(b)?;
                let (dx, dy) = (bx - ax, by - ay);
                let dist_sq = (dx * dx + dy * dy).max(0.01);
                let push = params.repulsion_constant / dist_sq;
                let dist = dist_sq.sqrt();
                moves.push((a, -push * dx / dist, -push * dy / dist));
                moves.push((b, push * dx / dist, push * dy / dist));
            }
        }

        let mut moved: Vec<AgentRef> = Vec::new();
        for (turtle, dx, dy) in moves {
            let (x, y) = self.position(turtle)?;
            let (x, y) = (self.clamp_x(x + dx), self.clamp_y(y + dy));
            let slots = self.slots_mut(turtle)?;
            slots.vars[XCOR] = Value::Number(x);
            slots.vars[YCOR] = Value::Number(y);
            if !moved.contains(&turtle) {
                moved.push(turtle);
            }
        }
        Ok(moved
            .into_iter()
            .flat_map(|turtle| [(turtle, XCOR), (turtle, YCOR)])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn world_with_turtles(n: usize) -> SimpleWorld {
        SimpleWorld::from_spec(&WorldSpec {
            turtles: n,
            turtles_own: vec![VariableDef::new("energy", Domain::Range { min: 0.0, max: 100.0 })],
            ..WorldSpec::default()
        })
        .unwrap()
    }

    #[test]
    fn test_patch_grid() {
        let world = SimpleWorld::new();
        assert_eq!(world.agents(AgentKind::Patch).len(), 9);
        let patch = AgentRef::patch(5);
        assert_eq!(world.get_variable(patch, 0).unwrap(), Value::Number(2.0));
        assert_eq!(world.get_variable(patch, 1).unwrap(), Value::Number(1.0));
        assert_eq!(world.variable_index(AgentKind::Patch, "PCOLOR"), Some(3));
    }

    #[test]
    fn test_set_rejects_out_of_domain_and_keeps_value() {
        let mut world = world_with_turtles(1);
        let turtle = AgentRef::turtle(0);
        let energy = world.variable_index(AgentKind::Turtle, "energy").unwrap();

        world.set_variable(turtle, energy, Value::Number(40.0)).unwrap();
        let err = world.set_variable(turtle, energy, Value::Number(400.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AgentValidation);
        assert_eq!(world.get_variable(turtle, energy).unwrap(), Value::Number(40.0));
    }

    #[test]
    fn test_who_is_read_only() {
        let mut world = world_with_turtles(1);
        let err = world.set_variable(AgentRef::turtle(0), WHO, Value::Number(9.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AgentValidation);
    }

    #[test]
    fn test_dead_agents_refuse_access() {
        let mut world = world_with_turtles(2);
        let turtle = AgentRef::turtle(1);
        world.kill(turtle).unwrap();

        assert!(!world.is_alive(turtle));
        assert_eq!(world.get_variable(turtle, XCOR).unwrap_err().kind(), ErrorKind::AgentDead);
        assert_eq!(
            world.set_variable(turtle, XCOR, Value::Number(1.0)).unwrap_err().kind(),
            ErrorKind::AgentDead
        );
        assert_eq!(world.agents(AgentKind::Turtle).len(), 1);
    }

    #[test]
    fn test_dead_agent_reported_before_domain() {
        let mut world = world_with_turtles(1);
        let turtle = AgentRef::turtle(0);
        let energy = world.variable_index(AgentKind::Turtle, "energy").unwrap();
        world.kill(turtle).unwrap();

        let err = world.set_variable(turtle, energy, Value::Number(400.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AgentDead);
    }

    #[test]
    fn test_killing_turtle_kills_its_links() {
        let mut world = SimpleWorld::from_spec(&WorldSpec {
            turtles: 3,
            links: vec![(0, 1), (1, 2)],
            ..WorldSpec::default()
        })
        .unwrap();
        world.kill(AgentRef::turtle(0)).unwrap();
        assert!(!world.is_alive(AgentRef::link(0)));
        assert!(world.is_alive(AgentRef::link(1)));
    }

    #[test]
    fn test_patch_here() {
        let mut world = world_with_turtles(1);
        let turtle = AgentRef::turtle(0);
        world.set_variable(turtle, XCOR, Value::Number(1.6)).unwrap();
        world.set_variable(turtle, YCOR, Value::Number(2.2)).unwrap();
        assert_eq!(world.patch_here(turtle).unwrap(), AgentRef::patch(2 * 3 + 2));
    }

    #[test]
    fn test_cannot_leave_world() {
        let mut world = world_with_turtles(1);
        let err = world.set_variable(AgentRef::turtle(0), XCOR, Value::Number(10.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AgentValidation);
    }

    #[test]
    fn test_snapshot() {
        let world = world_with_turtles(2);
        let snapshot = world.snapshot();
        assert_eq!(snapshot["turtles"].as_array().unwrap().len(), 2);
        assert_eq!(snapshot["patches"].as_array().unwrap().len(), 9);
        assert_eq!(snapshot["turtles"][1]["who"], serde_json::json!(1.0));
    }

    #[test]
    fn test_layout_spring_pulls_linked_turtles_together() {
        let mut world = SimpleWorld::from_spec(&WorldSpec {
            width: 10,
            height: 1,
            turtles: 2,
            links: vec![(0, 1)],
            ..WorldSpec::default()
        })
        .unwrap();
        world.set_variable(AgentRef::turtle(1), XCOR, Value::Number(8.0)).unwrap();

        let nodes = world.agents(AgentKind::Turtle);
        let links = world.agents(AgentKind::Link);
        let params = SpringParams {
            spring_constant: 0.5,
            spring_length: 2.0,
            repulsion_constant: 0.0,
        };
        let written = world.layout_spring(&nodes, &links, params, &mut RandomStream::new(1)).unwrap();
        assert!(written.contains(&(AgentRef::turtle(0), XCOR)));
        assert!(written.contains(&(AgentRef::turtle(1), YCOR)));

        let x0 = world.get_variable(AgentRef::turtle(0), XCOR).unwrap().as_number().unwrap();
        let x1 = world.get_variable(AgentRef::turtle(1), XCOR).unwrap().as_number().unwrap();
        assert!(x1 - x0 < 8.0);
    }
}
