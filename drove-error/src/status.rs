//! Error status - how far an error may propagate

use std::fmt;

/// How an error must be handled once raised.
///
/// `Recoverable` errors abort the current job (or are caught by `carefully`)
/// and are reported to whoever started the run. `Fatal` errors signal a
/// defect in the compiled program and travel to the outermost boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// Abort the job or procedure invocation and report to the run initiator
    Recoverable,
    /// A defect; never caught by agent-level handling
    Fatal,
}

impl ErrorStatus {
    /// Check if this error is a defect signal
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorStatus::Fatal)
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStatus::Recoverable => write!(f, "recoverable"),
            ErrorStatus::Fatal => write!(f, "fatal"),
        }
    }
}
