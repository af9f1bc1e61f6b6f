//! # Compiler Output
//!
//! The form programs arrive in from the compiler: procedures made of
//! statements whose variable slots are already resolved but whose nested
//! blocks are still trees. The [`Assembler`](crate::assembler::Assembler)
//! flattens them into jump-resolved instruction streams.
//!
//! Everything here is serde-deserializable so compiled programs can be
//! stored as JSON:
//!
//! ```json
//! {"prim": "set_patch_variable", "vn": 3, "args": [{"prim": "constant", "value": 5}]}
//! ```

use crate::prim::{Command, Reporter};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source position of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl FromStr for Position {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (line, column) = s.split_once(':').unwrap_or((s, "0"));
        Ok(Self {
            line: line.trim().parse()?,
            column: column.trim().parse()?,
        })
    }
}

/// A reporter application with its argument sub-expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub reporter: Reporter,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Expr>,
    #[serde(default)]
    pub position: Position,
}

impl Expr {
    pub fn new(reporter: Reporter) -> Self {
        Self {
            reporter,
            args: Vec::new(),
            position: Position::default(),
        }
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::new(Reporter::Constant { value: value.into() })
    }

    pub fn arg(mut self, arg: Expr) -> Self {
        self.args.push(arg);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.position = Position::new(line, column);
        self
    }

    /// The constant this expression stands for, if it is one
    pub fn as_constant(&self) -> Option<&Value> {
        match &self.reporter {
            Reporter::Constant { value } => Some(value),
            _ => None,
        }
    }
}

/// A command application with its arguments and nested blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(flatten)]
    pub command: Command,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Vec<Statement>>,
    #[serde(default)]
    pub position: Position,
}

impl Statement {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            args: Vec::new(),
            blocks: Vec::new(),
            position: Position::default(),
        }
    }

    pub fn arg(mut self, arg: Expr) -> Self {
        self.args.push(arg);
        self
    }

    pub fn block(mut self, block: Vec<Statement>) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.position = Position::new(line, column);
        self
    }
}

/// A compiled procedure before assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDef {
    pub name: String,
    /// Number of inputs; they occupy the first local slots
    #[serde(default)]
    pub inputs: usize,
    /// Total local slots, inputs included
    #[serde(default)]
    pub locals: usize,
    pub body: Vec<Statement>,
}

impl ProcedureDef {
    pub fn new(name: impl Into<String>, body: Vec<Statement>) -> Self {
        Self {
            name: name.into(),
            inputs: 0,
            locals: 0,
            body,
        }
    }

    pub fn with_inputs(mut self, inputs: usize) -> Self {
        self.inputs = inputs;
        self.locals = self.locals.max(inputs);
        self
    }

    pub fn with_locals(mut self, locals: usize) -> Self {
        self.locals = locals.max(self.inputs);
        self
    }
}

/// A compiled program before assembly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramDef {
    pub procedures: Vec<ProcedureDef>,
}

impl ProgramDef {
    pub fn new(procedures: Vec<ProcedureDef>) -> Self {
        Self { procedures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_round_trips_through_text() {
        let pos = Position::new(12, 4);
        assert_eq!(pos.to_string().parse::<Position>().unwrap(), pos);
        assert_eq!("7".parse::<Position>().unwrap(), Position::new(7, 0));
    }

    #[test]
    fn test_statement_from_json() {
        let stmt: Statement = serde_json::from_value(json!({
            "prim": "ask",
            "args": [{"prim": "patches"}],
            "blocks": [[
                {"prim": "set_patch_variable", "vn": 3, "args": [{"prim": "constant", "value": 5}]}
            ]],
            "position": {"line": 2, "column": 3}
        }))
        .unwrap();

        assert_eq!(stmt.command, Command::Ask);
        assert_eq!(stmt.args[0].reporter, Reporter::Patches);
        assert_eq!(stmt.blocks[0][0].command, Command::SetPatchVariable { vn: 3 });
        assert_eq!(stmt.blocks[0][0].args[0].as_constant(), Some(&Value::Number(5.0)));
        assert_eq!(stmt.position, Position::new(2, 3));
    }

    #[test]
    fn test_call_from_json() {
        let stmt: Statement = serde_json::from_value(json!({
            "prim": "call", "procedure": "wiggle"
        }))
        .unwrap();
        assert_eq!(
            stmt.command,
            Command::Call { procedure: "wiggle".to_string(), index: 0 }
        );
    }

    #[test]
    fn test_procedure_locals_cover_inputs() {
        let proc = ProcedureDef::new("f", vec![]).with_inputs(2).with_locals(1);
        assert_eq!(proc.locals, 2);
    }
}
