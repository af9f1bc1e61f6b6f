//! Change notification towards the rendering/observer layer.

use crate::agent::AgentRef;
use crate::value::Value;

/// Receives fire-and-forget notifications from the engine
pub trait Notifier {
    /// Called after every successful variable write with the stored value
    fn variable_changed(&mut self, agent: AgentRef, slot: usize, value: &Value) {
        let _ = (agent, slot, value);
    }

    /// Called for text produced by `print`
    fn output(&mut self, text: &str) {
        let _ = text;
    }
}

/// Discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {}

/// Keeps every notification, in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingNotifier {
    pub changes: Vec<(AgentRef, usize, Value)>,
    pub outputs: Vec<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for RecordingNotifier {
    fn variable_changed(&mut self, agent: AgentRef, slot: usize, value: &Value) {
        self.changes.push((agent, slot, value.clone()));
    }

    fn output(&mut self, text: &str) {
        self.outputs.push(text.to_string());
    }
}
