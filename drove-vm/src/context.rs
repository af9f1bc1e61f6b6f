//! # Execution Context
//!
//! The interpreter loop. A [`Context`] is the transient state of one agent
//! executing one job: the agent, the job, the instruction pointer, the call
//! frames and the last reported value. It is rebuilt from the job's
//! [`Cursor`] for every micro-step and dissolved back into it afterwards.
//!
//! Everything a primitive may touch beyond that travels in the [`Handle`]:
//! the world, the assembled program, the notifier, the limits and the halt
//! flag.

use crate::agent::AgentRef;
use crate::assembler::{Instruction, Program};
use crate::error::{self, Error, ExecutionSite, Result};
use crate::frame::CallStack;
use crate::job::{Cursor, HaltFlag, Job, Limits};
use crate::notify::Notifier;
use crate::perform;
use crate::prim::Command;
use crate::syntax::{Expr, Position};
use crate::value::Value;
use crate::world::World;

/// Engine resources shared by every context of a run
pub struct Handle<'h> {
    pub world: &'h mut dyn World,
    pub program: &'h Program,
    pub notifier: &'h mut dyn Notifier,
    pub limits: Limits,
    pub halt: &'h HaltFlag,
    /// Exclusive jobs currently running inside each other
    pub nesting: usize,
}

/// One agent executing one job
pub struct Context<'c, 'h> {
    pub handle: &'c mut Handle<'h>,
    pub job: &'c mut Job,
    pub agent: AgentRef,
    pub ip: usize,
    pub frames: CallStack,
    /// Value of the last evaluated argument
    pub last_reported: Value,
    /// Message of the error caught by the enclosing `carefully`
    pub error_message: Option<String>,
    /// Set once the agent reached its terminal marker
    pub finished: bool,
    base_depth: usize,
}

impl<'c, 'h> Context<'c, 'h> {
    /// Rebuild a context from a cursor
    pub fn resume(handle: &'c mut Handle<'h>, job: &'c mut Job, cursor: Cursor) -> Self {
        Context {
            handle,
            job,
            agent: cursor.agent,
            ip: cursor.ip,
            frames: cursor.frames,
            last_reported: Value::Nobody,
            error_message: cursor.error_message,
            finished: false,
            base_depth: cursor.base_depth,
        }
    }

    /// Dissolve the context back into a cursor
    pub fn into_cursor(self) -> Cursor {
        Cursor {
            agent: self.agent,
            ip: self.ip,
            frames: self.frames,
            base_depth: self.base_depth,
            error_message: self.error_message,
        }
    }

    /// Index of the running procedure
    pub fn procedure(&self) -> usize {
        self.frames.top().procedure
    }

    /// Whether returning now would end the agent's block
    pub fn at_base(&self) -> bool {
        self.frames.len() <= self.base_depth
    }

    pub fn local(&self, slot: usize) -> Result<Value> {
        self.frames.top().get(slot).cloned()
    }

    pub fn set_local(&mut self, slot: usize, value: Value) -> Result<()> {
        self.frames.top_mut().set(slot, value)
    }

    /// Run until a switching instruction or the terminal marker
    pub fn run_until_switch(&mut self) -> Result<()> {
        let program = self.handle.program;
        loop {
            let instr = self.fetch(program)?;
            self.execute(instr)?;
            if self.finished {
                return Ok(());
            }
            if instr.switches {
                self.finished = self.at_terminal(program)?;
                return Ok(());
            }
        }
    }

    /// Run until the terminal marker, ignoring switches
    pub fn run_to_completion(&mut self) -> Result<()> {
        let program = self.handle.program;
        while !self.finished {
            let instr = self.fetch(program)?;
            self.execute(instr)?;
        }
        Ok(())
    }

    fn fetch(&self, program: &'h Program) -> Result<&'h Instruction> {
        if self.handle.halt.is_raised() {
            return Err(error::halted());
        }
        let instr = program.instruction(self.procedure(), self.ip)?;
        tracing::trace!(
            agent = %self.agent,
            ip = self.ip,
            prim = instr.command.token(),
            "execute"
        );
        Ok(instr)
    }

    fn at_terminal(&self, program: &Program) -> Result<bool> {
        let next = program.instruction(self.procedure(), self.ip)?;
        Ok(match next.command {
            Command::Done => true,
            Command::Return | Command::Stop => self.at_base(),
            _ => false,
        })
    }

    /// Perform one instruction, binding any failure to it
    pub fn execute(&mut self, instr: &Instruction) -> Result<()> {
        let result = match &instr.preevaluated {
            Some(arg0) => perform::perform_1(instr, self, arg0.clone()),
            None => perform::perform(instr, self),
        };
        result.map_err(|err| self.bind_instruction(instr, err))
    }

    /// The site of a primitive run by this context
    pub fn site(&self, primitive: String, position: Position) -> ExecutionSite {
        let procedure = self
            .handle
            .program
            .procedure(self.procedure())
            .map(|p| p.name.clone())
            .unwrap_or_default();
        ExecutionSite {
            primitive,
            procedure,
            position,
            agent: self.agent.to_string(),
            message: String::new(),
        }
    }

    pub fn bind_instruction(&self, instr: &Instruction, err: Error) -> Error {
        if !needs_binding(&err) {
            return err;
        }
        let primitive = instr.describe(&*self.handle.world);
        self.site(primitive, instr.position).bind(err)
    }

    pub fn bind_expr(&self, expr: &Expr, err: Error) -> Error {
        if !needs_binding(&err) {
            return err;
        }
        let primitive = expr.reporter.describe(&*self.handle.world);
        self.site(primitive, expr.position).bind(err)
    }
}

fn needs_binding(err: &Error) -> bool {
    err.kind().is_agent_validation()
        || (err.kind() == error::ErrorKind::Runtime && err.context_value("primitive").is_none())
}
