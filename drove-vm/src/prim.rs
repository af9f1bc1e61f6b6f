//! # Primitives
//!
//! The instruction set of the engine, in two capability shapes:
//!
//! - [`Command`]: performs an effect and moves the instruction pointer,
//!   either to the next instruction or to an assembled jump target
//! - [`Reporter`]: computes a value for an enclosing primitive and leaves
//!   the instruction pointer alone
//!
//! Each variant carries only its own parameters (resolved variable slots,
//! procedure names). Arguments live next to the primitive in a
//! [`Statement`](crate::syntax::Statement) or [`Expr`](crate::syntax::Expr);
//! jump targets are patched into the [`Instruction`](crate::assembler::Instruction)
//! by the assembler.

use crate::agent::AgentKind;
use crate::value::Value;
use crate::world::World;
use serde::{Deserialize, Serialize};

/// A command primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "prim", rename_all = "snake_case")]
pub enum Command {
    // =========================================================================
    // VARIABLES
    // =========================================================================

    /// Set a global
    SetObserverVariable { vn: usize },

    /// Set a variable of the running turtle
    SetTurtleVariable { vn: usize },

    /// Set a variable of the running patch, or of the patch under the
    /// running turtle
    SetPatchVariable { vn: usize },

    /// Set a variable of the running link
    SetLinkVariable { vn: usize },

    /// Introduce a local and give it a value
    Let { slot: usize },

    /// Assign an existing local
    SetLocal { slot: usize },

    // =========================================================================
    // EXCLUSIVE BLOCKS - drive a nested job to completion
    // =========================================================================

    /// Run the block for every agent of an agent set (or one agent)
    Ask,

    /// Run the block with a private copy of the main random stream
    WithLocalRandomness,

    /// Create turtles and run the block for each of them
    CreateTurtles,

    /// Run the first block, falling back to the second on a runtime error
    Carefully,

    // =========================================================================
    // CONTROL FLOW
    // =========================================================================

    If,

    IfElse,

    /// Run the block a fixed number of times, counting in a hidden local
    Repeat { slot: usize },

    While,

    /// Call a procedure, passing the arguments as its inputs
    Call {
        procedure: String,
        /// Index of the callee, patched by the assembler
        #[serde(skip)]
        index: usize,
    },

    /// Leave the current procedure
    Stop,

    // =========================================================================
    // WORLD
    // =========================================================================

    /// Kill the running agent
    Die,

    Print,

    /// Spring layout over a node set connected by a link set
    LayoutSpring,

    // =========================================================================
    // SYNTHETIC - emitted by the assembler only
    // =========================================================================

    /// Unconditional jump to `offset`
    Goto,

    /// Loop head of `repeat`: count down, exit to `offset` at zero
    RepeatCheck { slot: usize },

    /// End of a nested job's block
    Done,

    /// End of a procedure
    Return,
}

impl Command {
    /// Name used in listings and diagnostics
    pub fn token(&self) -> &'static str {
        match self {
            Command::SetObserverVariable { .. } => "set-observer-variable",
            Command::SetTurtleVariable { .. } => "set-turtle-variable",
            Command::SetPatchVariable { .. } => "set-patch-variable",
            Command::SetLinkVariable { .. } => "set-link-variable",
            Command::Let { .. } => "let",
            Command::SetLocal { .. } => "set-local",
            Command::Ask => "ask",
            Command::WithLocalRandomness => "with-local-randomness",
            Command::CreateTurtles => "create-turtles",
            Command::Carefully => "carefully",
            Command::If => "if",
            Command::IfElse => "ifelse",
            Command::Repeat { .. } => "repeat",
            Command::While => "while",
            Command::Call { .. } => "call",
            Command::Stop => "stop",
            Command::Die => "die",
            Command::Print => "print",
            Command::LayoutSpring => "layout-spring",
            Command::Goto => "goto",
            Command::RepeatCheck { .. } => "repeat-check",
            Command::Done => "done",
            Command::Return => "return",
        }
    }

    /// Number of arguments the command takes. `None` for calls, whose arity
    /// is the callee's input count.
    pub fn arity(&self) -> Option<usize> {
        let n = match self {
            Command::SetObserverVariable { .. }
            | Command::SetTurtleVariable { .. }
            | Command::SetPatchVariable { .. }
            | Command::SetLinkVariable { .. }
            | Command::Let { .. }
            | Command::SetLocal { .. }
            | Command::Ask
            | Command::CreateTurtles
            | Command::If
            | Command::IfElse
            | Command::Repeat { .. }
            | Command::While
            | Command::Print => 1,
            Command::LayoutSpring => 5,
            Command::Call { .. } => return None,
            _ => 0,
        };
        Some(n)
    }

    /// Number of command blocks the command owns
    pub fn blocks(&self) -> usize {
        match self {
            Command::Ask
            | Command::WithLocalRandomness
            | Command::CreateTurtles
            | Command::If
            | Command::Repeat { .. }
            | Command::While => 1,
            Command::IfElse | Command::Carefully => 2,
            _ => 0,
        }
    }

    /// Whether executing this command ends the running agent's turn in a
    /// concurrent job step
    pub fn default_switches(&self) -> bool {
        matches!(
            self,
            Command::SetObserverVariable { .. }
                | Command::SetTurtleVariable { .. }
                | Command::SetPatchVariable { .. }
                | Command::SetLinkVariable { .. }
                | Command::CreateTurtles
                | Command::Die
                | Command::LayoutSpring
        )
    }

    /// Whether the command has a single-argument entry point
    pub fn is_unary(&self) -> bool {
        self.arity() == Some(1)
    }

    /// Whether the command drives a nested job
    pub fn is_exclusive(&self) -> bool {
        matches!(
            self,
            Command::Ask | Command::WithLocalRandomness | Command::CreateTurtles | Command::Carefully
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::Done | Command::Return)
    }

    /// Whether only the assembler may produce this command
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self,
            Command::Goto | Command::RepeatCheck { .. } | Command::Done | Command::Return
        )
    }

    /// The kind of agent a variable setter writes, if it is one
    pub fn variable_kind(&self) -> Option<(AgentKind, usize)> {
        match self {
            Command::SetObserverVariable { vn } => Some((AgentKind::Observer, *vn)),
            Command::SetTurtleVariable { vn } => Some((AgentKind::Turtle, *vn)),
            Command::SetPatchVariable { vn } => Some((AgentKind::Patch, *vn)),
            Command::SetLinkVariable { vn } => Some((AgentKind::Link, *vn)),
            _ => None,
        }
    }

    /// Token plus the parameter that distinguishes this instance
    pub fn describe(&self, world: &dyn World) -> String {
        if let Some((kind, vn)) = self.variable_kind() {
            return format!("{}:{}", self.token(), world.variable_name(kind, vn));
        }
        match self {
            Command::Call { procedure, .. } => format!("{}:{}", self.token(), procedure),
            _ => self.token().to_string(),
        }
    }
}

/// A reporter primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "prim", rename_all = "snake_case")]
pub enum Reporter {
    Constant { value: Value },

    ObserverVariable { vn: usize },
    TurtleVariable { vn: usize },
    PatchVariable { vn: usize },
    LinkVariable { vn: usize },
    Local { slot: usize },

    /// The running agent
    #[serde(rename = "self")]
    SelfAgent,

    Turtles,
    Patches,
    Links,

    Count,
    /// Integer draw from the job's stream
    Random,
    RandomFloat,
    OneOf,

    Plus,
    Minus,
    Mult,
    Div,
    Lt,
    Gt,
    Equal,
    Not,
    And,
    Or,

    /// Message of the error caught by the enclosing `carefully`
    ErrorMessage,

    /// An identifier the compiler could not resolve. Reaching it at run time
    /// is a defect.
    UnknownIdentifier { name: String },
}

impl Reporter {
    pub fn token(&self) -> &'static str {
        match self {
            Reporter::Constant { .. } => "constant",
            Reporter::ObserverVariable { .. } => "observer-variable",
            Reporter::TurtleVariable { .. } => "turtle-variable",
            Reporter::PatchVariable { .. } => "patch-variable",
            Reporter::LinkVariable { .. } => "link-variable",
            Reporter::Local { .. } => "local",
            Reporter::SelfAgent => "self",
            Reporter::Turtles => "turtles",
            Reporter::Patches => "patches",
            Reporter::Links => "links",
            Reporter::Count => "count",
            Reporter::Random => "random",
            Reporter::RandomFloat => "random-float",
            Reporter::OneOf => "one-of",
            Reporter::Plus => "+",
            Reporter::Minus => "-",
            Reporter::Mult => "*",
            Reporter::Div => "/",
            Reporter::Lt => "<",
            Reporter::Gt => ">",
            Reporter::Equal => "=",
            Reporter::Not => "not",
            Reporter::And => "and",
            Reporter::Or => "or",
            Reporter::ErrorMessage => "error-message",
            Reporter::UnknownIdentifier { .. } => "unknown-identifier",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Reporter::Count
            | Reporter::Random
            | Reporter::RandomFloat
            | Reporter::OneOf
            | Reporter::Not => 1,
            Reporter::Plus
            | Reporter::Minus
            | Reporter::Mult
            | Reporter::Div
            | Reporter::Lt
            | Reporter::Gt
            | Reporter::Equal
            | Reporter::And
            | Reporter::Or => 2,
            _ => 0,
        }
    }

    /// The variable a getter reads, if it is one
    pub fn variable_kind(&self) -> Option<(AgentKind, usize)> {
        match self {
            Reporter::ObserverVariable { vn } => Some((AgentKind::Observer, *vn)),
            Reporter::TurtleVariable { vn } => Some((AgentKind::Turtle, *vn)),
            Reporter::PatchVariable { vn } => Some((AgentKind::Patch, *vn)),
            Reporter::LinkVariable { vn } => Some((AgentKind::Link, *vn)),
            _ => None,
        }
    }

    pub fn describe(&self, world: &dyn World) -> String {
        if let Some((kind, vn)) = self.variable_kind() {
            return format!("{}:{}", self.token(), world.variable_name(kind, vn));
        }
        match self {
            Reporter::Constant { value } => format!("{}:{}", self.token(), value),
            Reporter::Local { slot } => format!("{}:{}", self.token(), slot),
            Reporter::UnknownIdentifier { name } => format!("{}:{}", self.token(), name),
            _ => self.token().to_string(),
        }
    }
}
