//! Error kinds for drove operations

use std::fmt;

/// The kind of error that occurred.
///
/// This enum categorizes errors so callers can match on what happened.
/// The default [`ErrorStatus`](crate::ErrorStatus) of an error is derived
/// from its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Agent errors (raised by the world, translated at dispatch)
    // =========================================================================
    /// A value violates a variable's domain constraint
    AgentValidation,

    /// The agent was already dead when it was accessed
    AgentDead,

    // =========================================================================
    // Execution errors
    // =========================================================================
    /// A primitive failed while running; bound to an execution site
    Runtime,

    /// The run was halted from outside
    Halted,

    /// A run exceeded its step budget
    StepLimitExceeded,

    /// Procedure call depth exceeded maximum
    CallDepthExceeded,

    /// Nested exclusive jobs exceeded maximum depth
    NestingTooDeep,

    // =========================================================================
    // Assembly errors
    // =========================================================================
    /// The compiled program could not be assembled
    AssemblyFailed,

    /// A called procedure does not exist
    ProcedureNotFound,

    // =========================================================================
    // Defects
    // =========================================================================
    /// The compiled instruction stream is invalid - never recovered
    InternalConsistency,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse input
    ParseFailed,

    /// Serialization/deserialization failed
    SerializationFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Agent
            ErrorKind::AgentValidation => "AgentValidation",
            ErrorKind::AgentDead => "AgentDead",

            // Execution
            ErrorKind::Runtime => "Runtime",
            ErrorKind::Halted => "Halted",
            ErrorKind::StepLimitExceeded => "StepLimitExceeded",
            ErrorKind::CallDepthExceeded => "CallDepthExceeded",
            ErrorKind::NestingTooDeep => "NestingTooDeep",

            // Assembly
            ErrorKind::AssemblyFailed => "AssemblyFailed",
            ErrorKind::ProcedureNotFound => "ProcedureNotFound",

            // Defects
            ErrorKind::InternalConsistency => "InternalConsistency",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",

            // Parse
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",
        }
    }

    /// Check if this error kind is a defect by default
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::InternalConsistency)
    }

    /// Check if this kind is raised by the agent model and must be
    /// translated before it leaves the dispatch layer
    pub fn is_agent_validation(&self) -> bool {
        matches!(self, ErrorKind::AgentValidation | ErrorKind::AgentDead)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::AgentValidation.to_string(), "AgentValidation");
        assert_eq!(ErrorKind::InternalConsistency.to_string(), "InternalConsistency");
    }

    #[test]
    fn test_is_fatal() {
        assert!(ErrorKind::InternalConsistency.is_fatal());
        assert!(!ErrorKind::Runtime.is_fatal());
        assert!(!ErrorKind::AgentDead.is_fatal());
    }

    #[test]
    fn test_is_agent_validation() {
        assert!(ErrorKind::AgentValidation.is_agent_validation());
        assert!(ErrorKind::AgentDead.is_agent_validation());
        assert!(!ErrorKind::Runtime.is_agent_validation());
    }
}
