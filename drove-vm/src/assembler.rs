//! # Assembler
//!
//! Flattens compiled procedures into jump-resolved instruction streams.
//!
//! Every block-taking command lays itself out through the
//! [`AssemblerAssistant`] protocol: it appends its own instruction, assembles
//! its blocks inline and asks the assistant to patch forward references
//! (`offset`, `alternate`) once their targets are known. The finished
//! [`Program`] is verified before it is handed out, so the interpreter loop
//! never sees a jump outside its procedure.
//!
//! ```text
//!   0 |    ask patches  → 3  *
//!   1 |        set-patch-variable:pcolor 5  *
//!   2 |    done
//!   3 |    return
//! ```

use crate::agent::AgentKind;
use crate::error::{self, Result};
use crate::prim::{Command, Reporter};
use crate::syntax::{Expr, Position, ProcedureDef, ProgramDef, Statement};
use crate::value::Value;
use crate::world::World;
use std::collections::HashMap;
use std::fmt::Write;

/// One assembled command
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub command: Command,
    pub args: Vec<Expr>,
    /// Sequential successor
    pub next: usize,
    /// Resume point of a construct, or the target of a jump
    pub offset: usize,
    /// Entry of the second block of `ifelse` and `carefully`
    pub alternate: usize,
    /// Whether executing this instruction ends the agent's turn
    pub switches: bool,
    pub position: Position,
    /// Constant single argument, evaluated once at assembly time
    pub preevaluated: Option<Value>,
}

impl Instruction {
    fn new(command: Command, args: Vec<Expr>, position: Position, ip: usize) -> Self {
        let switches = command.default_switches();
        Self {
            command,
            args,
            next: ip + 1,
            offset: 0,
            alternate: 0,
            switches,
            position,
            preevaluated: None,
        }
    }

    /// Diagnostic name of the instruction
    pub fn describe(&self, world: &dyn World) -> String {
        self.command.describe(world)
    }

    fn has_offset(&self) -> bool {
        self.command.blocks() > 0
            || matches!(self.command, Command::Goto | Command::RepeatCheck { .. })
    }

    fn has_alternate(&self) -> bool {
        matches!(self.command, Command::IfElse | Command::Carefully)
    }
}

/// An assembled procedure
#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    pub name: String,
    pub inputs: usize,
    pub locals: usize,
    pub code: Vec<Instruction>,
}

/// Assembled procedures, addressed by index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub procedures: Vec<Procedure>,
}

impl Program {
    /// Look up a procedure by name, ignoring case
    pub fn lookup(&self, name: &str) -> Result<(usize, &Procedure)> {
        self.procedures
            .iter()
            .enumerate()
            .find(|(_, p)| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| error::procedure_not_found(name))
    }

    /// Procedure at `index`; the index came from assembly
    pub fn procedure(&self, index: usize) -> Result<&Procedure> {
        self.procedures.get(index).ok_or_else(|| {
            error::internal_consistency(format!("procedure index {} does not exist", index))
        })
    }

    /// Instruction at `ip` in procedure `index`
    pub fn instruction(&self, index: usize, ip: usize) -> Result<&Instruction> {
        let procedure = self.procedure(index)?;
        procedure.code.get(ip).ok_or_else(|| {
            error::internal_consistency(format!(
                "instruction pointer {} is outside {}",
                ip, procedure.name
            ))
        })
    }

    /// Human-readable listing of every procedure
    pub fn listing(&self, world: &dyn World) -> String {
        let mut out = String::new();
        for procedure in &self.procedures {
            let _ = writeln!(out, "--- {} ---", procedure.name);
            let _ = writeln!(out, "Inputs: {}  Locals: {}", procedure.inputs, procedure.locals);
            let _ = writeln!(out, "Instructions: {}", procedure.code.len());
            out.push('\n');

            let mut depth = 0usize;
            for (ip, instr) in procedure.code.iter().enumerate() {
                let closing = usize::from(matches!(instr.command, Command::Done))
                    + closed_blocks(procedure, ip);
                depth = depth.saturating_sub(closing);
                let (name, details) = instr.format_parts(world);
                let indent = "    ".repeat(depth + 1);
                if details.is_empty() {
                    let _ = writeln!(out, "{:3} |{}{}", ip, indent, name);
                } else {
                    let _ = writeln!(out, "{:3} |{}{} {}", ip, indent, name, details);
                }
                if instr.command.blocks() > 0 {
                    depth += 1;
                }
            }
            out.push('\n');
        }
        out
    }

    /// Print the listing to stdout
    pub fn pretty_print(&self, world: &dyn World) {
        print!("{}", self.listing(world));
    }
}

/// Number of inline constructs whose resume point is `ip`
fn closed_blocks(procedure: &Procedure, ip: usize) -> usize {
    procedure.code[..ip]
        .iter()
        .filter(|owner| {
            owner.command.blocks() > 0 && !owner.command.is_exclusive() && owner.offset == ip
        })
        .count()
}

impl Instruction {
    /// Format the instruction into (name, details) for listings
    fn format_parts(&self, world: &dyn World) -> (String, String) {
        let mut details: Vec<String> = self.args.iter().map(|a| format_expr_brief(a, world)).collect();
        match self.command {
            Command::Goto | Command::RepeatCheck { .. } => details.push(format!("→ {}", self.offset)),
            _ if self.command.blocks() > 0 => details.push(format!("→ {}", self.offset)),
            _ => {}
        }
        if self.has_alternate() {
            details.push(format!("else {}", self.alternate));
        }
        if self.switches {
            details.push("*".to_string());
        }
        (self.describe(world), details.join("  "))
    }
}

fn format_expr_brief(expr: &Expr, world: &dyn World) -> String {
    let head = match &expr.reporter {
        Reporter::Constant { value } => value.to_string(),
        other => other.describe(world),
    };
    if expr.args.is_empty() {
        head
    } else {
        let args: Vec<String> = expr.args.iter().map(|a| format_expr_brief(a, world)).collect();
        format!("({} {})", head, args.join(" "))
    }
}

// =============================================================================
// Assembly
// =============================================================================

/// Assembler settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Admit unresolved identifiers; reaching one at run time is then a
    /// fatal defect instead of an assembly error
    pub forgiving: bool,
}

/// Turns a [`ProgramDef`] into a verified [`Program`]
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    options: AssemblerOptions,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: AssemblerOptions) -> Self {
        Self { options }
    }

    /// Assemble every procedure, resolving variable slots against `world`
    pub fn assemble(&self, def: &ProgramDef, world: &dyn World) -> Result<Program> {
        let mut names: HashMap<String, usize> = HashMap::new();
        for (index, procedure) in def.procedures.iter().enumerate() {
            if names.insert(procedure.name.to_lowercase(), index).is_some() {
                return Err(error::assembly_failed(
                    &procedure.name,
                    format!("procedure {} is defined twice", procedure.name),
                ));
            }
            if procedure.locals < procedure.inputs {
                return Err(error::assembly_failed(
                    &procedure.name,
                    format!(
                        "{} declares {} inputs but only {} local slots",
                        procedure.name, procedure.inputs, procedure.locals
                    ),
                ));
            }
        }

        let mut program = Program::default();
        for procedure in &def.procedures {
            let mut assistant = AssemblerAssistant {
                options: self.options,
                world,
                names: &names,
                defs: &def.procedures,
                procedure,
                code: Vec::new(),
                pending: Vec::new(),
            };
            for stmt in &procedure.body {
                assistant.statement(stmt)?;
            }
            let end = assistant.offset();
            assistant.add_internal(Command::Return, Position::default());
            assistant.code[end].next = end;

            tracing::debug!(
                procedure = %procedure.name,
                instructions = assistant.code.len(),
                "assembled procedure"
            );
            program.procedures.push(Procedure {
                name: procedure.name.clone(),
                inputs: procedure.inputs,
                locals: procedure.locals,
                code: assistant.code,
            });
        }

        verify(&program)?;
        Ok(program)
    }
}

/// Check every jump target and call index of an assembled program
pub fn verify(program: &Program) -> Result<()> {
    for procedure in &program.procedures {
        let len = procedure.code.len();
        if !matches!(procedure.code.last().map(|i| &i.command), Some(Command::Return)) {
            return Err(error::internal_consistency(format!(
                "{} does not end in return",
                procedure.name
            )));
        }
        for (ip, instr) in procedure.code.iter().enumerate() {
            if !instr.command.is_terminal() && instr.next >= len {
                return Err(error::invalid_jump(&procedure.name, ip, instr.next));
            }
            if instr.has_offset() && instr.offset >= len {
                return Err(error::invalid_jump(&procedure.name, ip, instr.offset));
            }
            if instr.has_alternate() && instr.alternate >= len {
                return Err(error::invalid_jump(&procedure.name, ip, instr.alternate));
            }
            if let Command::Call { index, .. } = instr.command {
                if index >= program.procedures.len() {
                    return Err(error::internal_consistency(format!(
                        "instruction {} in {} calls missing procedure {}",
                        ip, procedure.name, index
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Layout helper handed to each construct while one procedure is assembled
pub struct AssemblerAssistant<'a> {
    options: AssemblerOptions,
    world: &'a dyn World,
    names: &'a HashMap<String, usize>,
    defs: &'a [ProcedureDef],
    procedure: &'a ProcedureDef,
    code: Vec<Instruction>,
    /// Forward gotos waiting for `come_from`
    pending: Vec<usize>,
}

impl<'a> AssemblerAssistant<'a> {
    /// Current position
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Append the statement's own instruction, returning its position
    pub fn add(&mut self, stmt: &Statement) -> Result<usize> {
        let ip = self.offset();
        let command = self.resolve(stmt)?;
        let mut instr = Instruction::new(command, stmt.args.clone(), stmt.position, ip);
        if instr.command.is_unary() {
            instr.preevaluated = stmt.args.first().and_then(Expr::as_constant).cloned();
        }
        self.code.push(instr);
        Ok(ip)
    }

    /// Append a synthetic instruction
    pub fn add_internal(&mut self, command: Command, position: Position) -> usize {
        let ip = self.offset();
        self.code.push(Instruction::new(command, Vec::new(), position, ip));
        ip
    }

    /// Assemble block `n` of `stmt` inline
    pub fn block(&mut self, stmt: &Statement, n: usize) -> Result<()> {
        let block = stmt.blocks.get(n).ok_or_else(|| {
            error::assembly_failed(
                &self.procedure.name,
                format!("{} is missing block {}", stmt.command.token(), n + 1),
            )
        })?;
        for inner in block {
            self.statement(inner)?;
        }
        Ok(())
    }

    /// Append the terminal marker of a nested job's block
    pub fn done(&mut self, owner: usize) {
        let position = self.code[owner].position;
        self.add_internal(Command::Done, position);
    }

    /// Point the owner's `offset` just past the construct
    pub fn resume(&mut self, owner: usize) {
        self.code[owner].offset = self.offset();
    }

    /// Owner's `alternate` := current position
    pub fn mark_alternate(&mut self, owner: usize) {
        self.code[owner].alternate = self.offset();
    }

    /// Append a forward jump patched by the next [`come_from`](Self::come_from)
    pub fn go_to(&mut self, owner: usize) {
        let position = self.code[owner].position;
        let ip = self.add_internal(Command::Goto, position);
        self.pending.push(ip);
    }

    /// Patch the most recent pending jump to the current position
    pub fn come_from(&mut self) -> Result<()> {
        let ip = self.pending.pop().ok_or_else(|| {
            error::internal_consistency(format!("come_from without go_to in {}", self.procedure.name))
        })?;
        self.code[ip].offset = self.offset();
        Ok(())
    }

    /// Append a jump to an earlier position
    pub fn jump_back(&mut self, owner: usize, target: usize) {
        let position = self.code[owner].position;
        let ip = self.add_internal(Command::Goto, position);
        self.code[ip].offset = target;
    }

    fn statement(&mut self, stmt: &Statement) -> Result<()> {
        let start = self.offset();
        match &stmt.command {
            Command::Ask | Command::WithLocalRandomness | Command::CreateTurtles => {
                let owner = self.add(stmt)?;
                self.block(stmt, 0)?;
                self.done(owner);
                self.resume(owner);
            }
            Command::If => {
                let owner = self.add(stmt)?;
                self.block(stmt, 0)?;
                self.resume(owner);
            }
            Command::IfElse => {
                let owner = self.add(stmt)?;
                self.block(stmt, 0)?;
                self.go_to(owner);
                self.mark_alternate(owner);
                self.block(stmt, 1)?;
                self.come_from()?;
                self.resume(owner);
            }
            Command::Repeat { slot } => {
                let owner = self.add(stmt)?;
                let check = self.add_internal(Command::RepeatCheck { slot: *slot }, stmt.position);
                self.block(stmt, 0)?;
                self.jump_back(owner, check);
                self.resume(owner);
                self.code[check].offset = self.code[owner].offset;
            }
            Command::While => {
                let owner = self.add(stmt)?;
                self.block(stmt, 0)?;
                self.jump_back(owner, owner);
                self.resume(owner);
            }
            Command::Carefully => {
                let owner = self.add(stmt)?;
                self.block(stmt, 0)?;
                self.done(owner);
                self.mark_alternate(owner);
                self.block(stmt, 1)?;
                self.resume(owner);
            }
            _ => {
                self.add(stmt)?;
            }
        }

        if stmt.command.blocks() > 0 {
            let inner = self.code[start + 1..].iter().any(|i| i.switches);
            self.code[start].switches |= inner;
        }
        Ok(())
    }

    /// Validate a statement and resolve its call target
    fn resolve(&self, stmt: &Statement) -> Result<Command> {
        let name = &self.procedure.name;
        let token = stmt.command.token();

        if stmt.command.is_synthetic() {
            return Err(error::assembly_failed(name, format!("{} cannot appear in source", token)));
        }
        if stmt.blocks.len() != stmt.command.blocks() {
            return Err(error::assembly_failed(
                name,
                format!(
                    "{} takes {} blocks but got {}",
                    token,
                    stmt.command.blocks(),
                    stmt.blocks.len()
                ),
            ));
        }

        let command = match &stmt.command {
            Command::Call { procedure, .. } => {
                let index = *self
                    .names
                    .get(&procedure.to_lowercase())
                    .ok_or_else(|| error::procedure_not_found(procedure.as_str()))?;
                let inputs = self.defs[index].inputs;
                if stmt.args.len() != inputs {
                    return Err(error::assembly_failed(
                        name,
                        format!("{} expects {} inputs but got {}", procedure, inputs, stmt.args.len()),
                    ));
                }
                Command::Call { procedure: procedure.clone(), index }
            }
            other => other.clone(),
        };

        if let Some(arity) = command.arity() {
            if stmt.args.len() != arity {
                return Err(error::assembly_failed(
                    name,
                    format!("{} expects {} inputs but got {}", token, arity, stmt.args.len()),
                ));
            }
        }
        if let Some((kind, vn)) = command.variable_kind() {
            self.check_slot(kind, vn)?;
        }
        if let Command::Let { slot } | Command::SetLocal { slot } | Command::Repeat { slot } = command {
            self.check_local(slot)?;
        }
        for arg in &stmt.args {
            self.check_expr(arg)?;
        }
        Ok(command)
    }

    fn check_expr(&self, expr: &Expr) -> Result<()> {
        let name = &self.procedure.name;
        let reporter = &expr.reporter;
        if expr.args.len() != reporter.arity() {
            return Err(error::assembly_failed(
                name,
                format!(
                    "{} expects {} inputs but got {}",
                    reporter.token(),
                    reporter.arity(),
                    expr.args.len()
                ),
            ));
        }
        match reporter {
            Reporter::UnknownIdentifier { name: ident } if !self.options.forgiving => {
                return Err(error::assembly_failed(name, format!("Nothing named {} has been defined.", ident))
                    .with_context("position", expr.position.to_string()));
            }
            Reporter::Local { slot } => self.check_local(*slot)?,
            _ => {}
        }
        if let Some((kind, vn)) = reporter.variable_kind() {
            self.check_slot(kind, vn)?;
        }
        for arg in &expr.args {
            self.check_expr(arg)?;
        }
        Ok(())
    }

    fn check_slot(&self, kind: AgentKind, vn: usize) -> Result<()> {
        if vn >= self.world.variables(kind).len() {
            return Err(error::assembly_failed(
                &self.procedure.name,
                format!("{} variable slot {} does not exist", kind, vn),
            ));
        }
        Ok(())
    }

    fn check_local(&self, slot: usize) -> Result<()> {
        if slot >= self.procedure.locals {
            return Err(error::assembly_failed(
                &self.procedure.name,
                format!("local slot {} exceeds the {} declared", slot, self.procedure.locals),
            ));
        }
        Ok(())
    }
}
