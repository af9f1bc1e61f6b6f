//! # Agents and Agent Sets
//!
//! The engine never owns agents. It refers to them through [`AgentRef`]
//! handles resolved by the [`World`](crate::world::World), and executes jobs
//! over homogeneous [`AgentSet`]s.

use crate::random::RandomStream;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The kind of a simulated entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Observer,
    Turtle,
    Patch,
    Link,
}

impl AgentKind {
    /// All kinds, observer first
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Observer,
        AgentKind::Turtle,
        AgentKind::Patch,
        AgentKind::Link,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Observer => "observer",
            AgentKind::Turtle => "turtle",
            AgentKind::Patch => "patch",
            AgentKind::Link => "link",
        }
    }

    /// Plural name used for agent sets
    pub fn plural(&self) -> &'static str {
        match self {
            AgentKind::Observer => "observer",
            AgentKind::Turtle => "turtles",
            AgentKind::Patch => "patches",
            AgentKind::Link => "links",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-owning handle to an agent held by the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentRef {
    pub kind: AgentKind,
    pub id: usize,
}

impl AgentRef {
    /// The single observer
    pub const OBSERVER: AgentRef = AgentRef {
        kind: AgentKind::Observer,
        id: 0,
    };

    pub fn new(kind: AgentKind, id: usize) -> Self {
        Self { kind, id }
    }

    pub fn turtle(id: usize) -> Self {
        Self::new(AgentKind::Turtle, id)
    }

    pub fn patch(id: usize) -> Self {
        Self::new(AgentKind::Patch, id)
    }

    pub fn link(id: usize) -> Self {
        Self::new(AgentKind::Link, id)
    }

    pub fn is_observer(&self) -> bool {
        self.kind == AgentKind::Observer
    }
}

impl fmt::Display for AgentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AgentKind::Observer => f.write_str("observer"),
            kind => write!(f, "{} {}", kind, self.id),
        }
    }
}

/// Homogeneous collection of agents; the unit a job executes over.
///
/// Unordered sets are visited in an order shuffled with the visiting job's
/// random stream. Ordered sets are visited as built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSet {
    kind: AgentKind,
    agents: Vec<AgentRef>,
    #[serde(default)]
    ordered: bool,
}

impl AgentSet {
    /// Empty set of the given kind
    pub fn empty(kind: AgentKind) -> Self {
        Self {
            kind,
            agents: Vec::new(),
            ordered: false,
        }
    }

    /// Set holding exactly one agent
    pub fn from_agent(agent: AgentRef) -> Self {
        Self {
            kind: agent.kind,
            agents: vec![agent],
            ordered: true,
        }
    }

    /// Start building a set of the given kind
    pub fn builder(kind: AgentKind) -> AgentSetBuilder {
        AgentSetBuilder::new(kind)
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn contains(&self, agent: AgentRef) -> bool {
        self.agents.contains(&agent)
    }

    /// Agents in build order
    pub fn iter(&self) -> impl Iterator<Item = AgentRef> + '_ {
        self.agents.iter().copied()
    }

    /// The order a job visits this set in
    pub fn visit_order(&self, random: &mut RandomStream) -> Vec<AgentRef> {
        let mut order = self.agents.clone();
        if !self.ordered && order.len() > 1 {
            order.shuffle(random);
        }
        order
    }

    /// Pick one agent uniformly, `None` when empty
    pub fn random_one(&self, random: &mut RandomStream) -> Option<AgentRef> {
        if self.agents.is_empty() {
            return None;
        }
        let index = random.next_int(self.agents.len() as u64) as usize;
        Some(self.agents[index])
    }
}

impl fmt::Display for AgentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(agentset, {} {})", self.agents.len(), self.kind.plural())
    }
}

/// Incremental builder for [`AgentSet`]; repeated agents are ignored
#[derive(Debug)]
pub struct AgentSetBuilder {
    kind: AgentKind,
    agents: Vec<AgentRef>,
    seen: HashSet<AgentRef>,
    ordered: bool,
}

impl AgentSetBuilder {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            agents: Vec::new(),
            seen: HashSet::new(),
            ordered: false,
        }
    }

    /// Keep build order when the set is visited
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Add an agent; returns false if the kind does not match or the agent
    /// is already present
    pub fn add(&mut self, agent: AgentRef) -> bool {
        if agent.kind != self.kind || !self.seen.insert(agent) {
            return false;
        }
        self.agents.push(agent);
        true
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn build(self) -> AgentSet {
        AgentSet {
            kind: self.kind,
            agents: self.agents,
            ordered: self.ordered,
        }
    }
}
