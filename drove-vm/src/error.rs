//! Drove VM error types
//!
//! Re-exports drove-error and provides engine-specific conveniences,
//! including the [`ExecutionSite`] view of runtime errors.

// Re-export the core error types
pub use drove_error::{Error, ErrorKind, ErrorStatus, Result};

use crate::agent::AgentKind;
use crate::syntax::Position;
use crate::value::Value;
use std::fmt;

// =============================================================================
// Agent-model failures (translated at the dispatch boundary)
// =============================================================================

/// Create an AgentValidation error
pub fn agent_validation(message: impl Into<String>) -> Error {
    Error::agent_validation(message)
}

/// Create an AgentValidation error for a violated variable domain
pub fn domain_violation(variable: &str, detail: impl Into<String>) -> Error {
    let detail = detail.into();
    Error::agent_validation(format!("{}: {}", variable.to_uppercase(), detail))
        .with_operation("world::set_variable")
        .with_context("variable", variable)
}

/// Create an AgentDead error
pub fn agent_dead(agent: impl Into<String>) -> Error {
    Error::agent_dead(agent)
}

// =============================================================================
// Runtime failures raised by primitives
// =============================================================================

/// Create a Runtime error not yet bound to a site
pub fn runtime(message: impl Into<String>) -> Error {
    Error::runtime(message)
}

/// Create a Runtime error for an argument of the wrong type
pub fn type_mismatch(primitive: &str, expected: &str, got: &Value) -> Error {
    let message = if got.is_nobody() {
        format!("{} expected input to be {} but got NOBODY instead.", primitive, expected)
    } else {
        format!(
            "{} expected input to be {} but got the {} {} instead.",
            primitive,
            expected,
            got.type_name(),
            got
        )
    };
    Error::runtime(message)
}

/// Create a Runtime error for code run by the wrong kind of agent
pub fn wrong_agent(primitive: &str, kind: AgentKind) -> Error {
    Error::agent_validation(format!("{} can't be run by the {}", primitive, kind))
}

/// Create a Halted error
pub fn halted() -> Error {
    Error::new(ErrorKind::Halted, "the run was halted")
}

/// Create a StepLimitExceeded error
pub fn step_limit_exceeded(max: usize) -> Error {
    Error::new(ErrorKind::StepLimitExceeded, format!("job did not finish within {} steps", max))
        .with_context("max_steps", max.to_string())
}

/// Create a CallDepthExceeded error
pub fn call_depth_exceeded(max: usize) -> Error {
    Error::new(ErrorKind::CallDepthExceeded, format!("call depth exceeded max {}", max))
        .with_context("max_depth", max.to_string())
}

/// Create a NestingTooDeep error
pub fn nesting_too_deep(max: usize) -> Error {
    Error::new(ErrorKind::NestingTooDeep, format!("nested jobs exceeded max depth {}", max))
        .with_context("max_nesting", max.to_string())
}

// =============================================================================
// Assembly and configuration
// =============================================================================

/// Create an AssemblyFailed error
pub fn assembly_failed(procedure: &str, message: impl Into<String>) -> Error {
    Error::new(ErrorKind::AssemblyFailed, message)
        .with_operation("assembler::assemble")
        .with_context("procedure", procedure)
}

/// Create a ProcedureNotFound error
pub fn procedure_not_found(name: impl Into<String>) -> Error {
    Error::procedure_not_found(name)
}

/// Create a ConfigInvalid error
pub fn config_invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::ConfigInvalid, message)
}

/// Create an Unsupported error
pub fn unsupported(message: impl Into<String>) -> Error {
    Error::unsupported(message)
}

// =============================================================================
// Defects
// =============================================================================

/// Create an InternalConsistency error
pub fn internal_consistency(message: impl Into<String>) -> Error {
    Error::internal_consistency(message)
}

/// A slot index the compiler should never have produced
pub fn slot_out_of_range(kind: AgentKind, slot: usize) -> Error {
    Error::internal_consistency(format!("{} variable slot {} does not exist", kind, slot))
        .with_context("slot", slot.to_string())
}

/// A jump target outside the procedure's code
pub fn invalid_jump(procedure: &str, ip: usize, target: usize) -> Error {
    Error::internal_consistency(format!(
        "instruction {} in {} jumps to {}, outside the procedure",
        ip, procedure, target
    ))
    .with_operation("assembler::verify")
    .with_context("procedure", procedure)
    .with_context("ip", ip.to_string())
}

// =============================================================================
// Execution sites
// =============================================================================

/// Where a runtime error happened: the failing primitive, the procedure it
/// belongs to, its source position and the agent running it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSite {
    pub primitive: String,
    pub procedure: String,
    pub position: Position,
    pub agent: String,
    pub message: String,
}

impl ExecutionSite {
    /// Recover the site recorded on a bound runtime error
    pub fn from_error(err: &Error) -> Option<Self> {
        if err.kind() != ErrorKind::Runtime {
            return None;
        }
        Some(Self {
            primitive: err.context_value("primitive")?.to_string(),
            procedure: err.context_value("procedure")?.to_string(),
            position: err.context_value("position")?.parse().ok()?,
            agent: err.context_value("agent")?.to_string(),
            message: err.message().to_string(),
        })
    }

    /// Bind `cause` to this site.
    ///
    /// Agent-validation failures become runtime errors carrying the original
    /// message. Runtime errors that already name a primitive and anything
    /// non-recoverable pass through untouched.
    pub fn bind(&self, cause: Error) -> Error {
        if cause.kind().is_agent_validation() {
            let message = cause.message().to_string();
            return self.annotate(Error::runtime(message).set_source(cause));
        }
        if cause.kind() == ErrorKind::Runtime && cause.context_value("primitive").is_none() {
            return self.annotate(cause);
        }
        cause
    }

    fn annotate(&self, err: Error) -> Error {
        err.with_operation("dispatch::perform")
            .with_context("primitive", self.primitive.clone())
            .with_context("procedure", self.procedure.clone())
            .with_context("position", self.position.to_string())
            .with_context("agent", self.agent.clone())
    }
}

impl fmt::Display for ExecutionSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        writeln!(f, "error while {} running {}", self.agent, self.primitive)?;
        write!(f, "  called by procedure {} at {}", self.procedure, self.position)
    }
}
