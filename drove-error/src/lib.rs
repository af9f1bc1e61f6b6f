//! # drove-error
//!
//! Unified error handling for the drove execution engine.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what went wrong (e.g., AgentValidation, Runtime)
//! - **ErrorStatus**: Decide how far it may travel (Recoverable or Fatal)
//! - **Error Context**: Locate the failing primitive, procedure and agent
//! - **Error Source**: Wrap the underlying failure without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use drove_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::AgentValidation, "pcolor must be a number")
//!         .with_operation("world::set_variable")
//!         .with_context("agent", "patch 3")
//!         .with_context("slot", "2"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, drove_error::Error>`
//! - Validation failures are translated once at the dispatch boundary
//! - Fatal errors mean the compiled program is broken; nothing catches them
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using drove Error
pub type Result<T> = std::result::Result<T, Error>;
