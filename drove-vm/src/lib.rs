//! # Drove VM
//!
//! The primitive-execution engine of an agent-based modeling language.
//!
//! ## Core Concepts
//! - **Assembler**: Flattens compiled procedures into jump-resolved instruction streams
//! - **Jobs**: Run a procedure over an agent set, concurrently or exclusively
//! - **Context**: One agent executing one job; the interpreter loop lives here
//! - **Primitives**: Commands move the instruction pointer, reporters produce values
//! - **World**: Trait-based access to agents, their variables and the main random stream
//! - **Random scopes**: Nested blocks can draw from a private copy of the main stream

pub mod agent;
pub mod args;
pub mod assembler;
pub mod context;
pub mod engine;
pub mod error;
pub mod frame;
pub mod job;
pub mod notify;
pub mod perform;
pub mod prim;
pub mod random;
pub mod report;
pub mod syntax;
pub mod value;
pub mod vars;
pub mod world;

pub use agent::{AgentKind, AgentRef, AgentSet, AgentSetBuilder};
pub use assembler::{Assembler, AssemblerAssistant, AssemblerOptions, Instruction, Procedure, Program};
pub use context::{Context, Handle};
pub use engine::Engine;
pub use error::{Error, ErrorKind, ErrorStatus, ExecutionSite, Result};
pub use frame::{CallStack, Frame, MAX_CALL_DEPTH};
pub use job::{Cursor, HaltFlag, Job, Limits, StepOutcome};
pub use notify::{Notifier, NullNotifier, RecordingNotifier};
pub use prim::{Command, Reporter};
pub use random::{RandomScope, RandomStream, SharedRandom};
pub use syntax::{Expr, Position, ProcedureDef, ProgramDef, Statement};
pub use value::Value;
pub use world::{Domain, SimpleWorld, SpringParams, VariableDef, World, WorldSpec};
