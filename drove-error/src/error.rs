//! The main Error type for drove

use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// The unified error type for all drove operations.
///
/// This error type provides:
/// - `kind`: What type of error occurred
/// - `message`: Human-readable description
/// - `status`: Whether agent-level handling may catch it
/// - `operation`: What operation caused the error
/// - `context`: Key-value pairs for diagnostics
/// - `source`: The underlying error (if any)
///
/// # Example
///
/// ```rust
/// use drove_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::Runtime, "Division by zero.")
///     .with_operation("report::div")
///     .with_context("agent", "turtle 4")
///     .with_context("procedure", "GO");
///
/// assert_eq!(err.kind(), ErrorKind::Runtime);
/// assert_eq!(err.status(), ErrorStatus::Recoverable);
/// assert_eq!(err.context_value("agent"), Some("turtle 4"));
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = if kind.is_fatal() {
            ErrorStatus::Fatal
        } else {
            ErrorStatus::Recoverable
        };

        Self {
            kind,
            message: message.into(),
            status,
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error status
    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Get the operation that caused this error
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Get the context key-value pairs
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// Get the most recent context value recorded under `key`
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get the source error (if any)
    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    // =========================================================================
    // Builders (chainable)
    // =========================================================================

    /// Set the operation that caused this error.
    ///
    /// If an operation was already set, the previous one is moved to context
    /// as "called" to preserve the call chain.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set the source error.
    ///
    /// # Panics (debug only)
    /// Panics in debug mode if source was already set.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    /// Check if this error signals a defect
    pub fn is_fatal(&self) -> bool {
        self.status.is_fatal()
    }
}

// =============================================================================
// Display - compact, single-line format for logs
// =============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.context.is_empty() {
            write!(f, ", context {{ ")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", key, value)?;
            }
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        Ok(())
    }
}

// =============================================================================
// Debug - verbose, multi-line format for debugging
// =============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.message.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Message: {}", self.message)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Context:")?;
            for (key, value) in &self.context {
                writeln!(f, "        {}: {}", key, value)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "    Source: {:?}", source)?;
        }

        Ok(())
    }
}

// =============================================================================
// std::error::Error implementation
// =============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// =============================================================================
// Convenient From implementations (be careful not to leak raw errors!)
// =============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}

// =============================================================================
// Convenience constructors
// =============================================================================

impl Error {
    /// Create an Unsupported error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    /// Create an AgentValidation error
    pub fn agent_validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AgentValidation, message)
    }

    /// Create an AgentDead error
    pub fn agent_dead(agent: impl Into<String>) -> Self {
        let agent = agent.into();
        Self::new(ErrorKind::AgentDead, format!("that {} is dead", agent))
            .with_context("agent", agent)
    }

    /// Create a Runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    /// Create an InternalConsistency error
    pub fn internal_consistency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalConsistency, message)
    }

    /// Create a ProcedureNotFound error
    pub fn procedure_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::ProcedureNotFound, format!("procedure '{}' not found", name))
            .with_context("procedure", name)
    }

    /// Create a ParseFailed error
    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }

    /// Create an InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::new(ErrorKind::AgentValidation, "pcolor must be a number");
        assert_eq!(err.kind(), ErrorKind::AgentValidation);
        assert_eq!(err.message(), "pcolor must be a number");
        assert_eq!(err.status(), ErrorStatus::Recoverable);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::new(ErrorKind::Runtime, "Division by zero.")
            .with_operation("report::div")
            .with_context("agent", "turtle 2")
            .with_context("procedure", "GO");

        assert_eq!(err.operation(), "report::div");
        assert_eq!(err.context().len(), 2);
        assert_eq!(err.context()[0], ("agent", "turtle 2".to_string()));
        assert_eq!(err.context_value("procedure"), Some("GO"));
        assert_eq!(err.context_value("missing"), None);
    }

    #[test]
    fn test_context_value_prefers_latest() {
        let err = Error::runtime("boom")
            .with_context("agent", "turtle 1")
            .with_context("agent", "turtle 7");
        assert_eq!(err.context_value("agent"), Some("turtle 7"));
    }

    #[test]
    fn test_operation_chaining() {
        let err = Error::new(ErrorKind::AgentValidation, "out of range")
            .with_operation("world::set_variable")
            .with_operation("perform::set_patch_variable");

        assert_eq!(err.operation(), "perform::set_patch_variable");
        assert_eq!(err.context().len(), 1);
        assert_eq!(err.context()[0], ("called", "world::set_variable".to_string()));
    }

    #[test]
    fn test_fatal_status() {
        let err = Error::internal_consistency("unknown identifier reached");
        assert!(err.is_fatal());
        assert_eq!(err.status(), ErrorStatus::Fatal);

        let err = Error::runtime("Division by zero.");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_display() {
        let err = Error::new(ErrorKind::Runtime, "Division by zero.")
            .with_operation("report::div")
            .with_context("agent", "turtle 0");

        let display = format!("{}", err);
        assert!(display.contains("Runtime"));
        assert!(display.contains("recoverable"));
        assert!(display.contains("report::div"));
        assert!(display.contains("agent: turtle 0"));
        assert!(display.contains("Division by zero."));
    }

    #[test]
    fn test_convenience_constructors() {
        let err = Error::agent_dead("turtle 3");
        assert_eq!(err.kind(), ErrorKind::AgentDead);
        assert_eq!(err.message(), "that turtle 3 is dead");

        let err = Error::procedure_not_found("setup");
        assert_eq!(err.kind(), ErrorKind::ProcedureNotFound);
        assert_eq!(err.context_value("procedure"), Some("setup"));
    }

    #[test]
    fn test_set_source() {
        let cause = Error::agent_validation("heading must be a number");
        let err = Error::runtime(cause.message().to_string()).set_source(cause);

        assert!(err.source_ref().is_some());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "model.json");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(err.operation(), "io");
    }
}
