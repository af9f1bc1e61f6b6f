//! Runtime values produced by reporters and stored in agent variables.

use crate::agent::{AgentRef, AgentSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value in the modeling language
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Nobody,
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Agent(AgentRef),
    AgentSet(AgentSet),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_agent(&self) -> Option<AgentRef> {
        match self {
            Value::Agent(agent) => Some(*agent),
            _ => None,
        }
    }

    pub fn as_agentset(&self) -> Option<&AgentSet> {
        match self {
            Value::AgentSet(set) => Some(set),
            _ => None,
        }
    }

    pub fn is_nobody(&self) -> bool {
        matches!(self, Value::Nobody)
    }

    /// Name of the value's type, as used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nobody => "nobody",
            Value::Boolean(_) => "TRUE/FALSE",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Agent(_) => "agent",
            Value::AgentSet(_) => "agentset",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<AgentRef> for Value {
    fn from(agent: AgentRef) -> Self {
        Value::Agent(agent)
    }
}

impl From<AgentSet> for Value {
    fn from(set: AgentSet) -> Self {
        Value::AgentSet(set)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nobody => f.write_str("nobody"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Agent(agent) => write!(f, "({})", agent),
            Value::AgentSet(set) => write!(f, "{}", set),
        }
    }
}
