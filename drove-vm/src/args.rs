//! Argument evaluation shared by every primitive.
//!
//! Free functions taking the context explicitly; the type checks produce
//! the runtime errors users see ("X expected input to be a number but got
//! ...").

use crate::agent::AgentSet;
use crate::context::Context;
use crate::error::{self, Result};
use crate::report;
use crate::syntax::Expr;
use crate::value::Value;

/// Evaluate an argument, recording it as the last reported value
pub fn eval(expr: &Expr, ctx: &mut Context<'_, '_>) -> Result<Value> {
    let value = report::report(expr, ctx)?;
    ctx.last_reported = value.clone();
    Ok(value)
}

/// Evaluate the argument at `index` of a primitive
pub fn eval_at(args: &[Expr], index: usize, ctx: &mut Context<'_, '_>) -> Result<Value> {
    let expr = args
        .get(index)
        .ok_or_else(|| error::internal_consistency(format!("argument {} is missing", index)))?;
    eval(expr, ctx)
}

pub fn eval_number(args: &[Expr], index: usize, primitive: &str, ctx: &mut Context<'_, '_>) -> Result<f64> {
    let value = eval_at(args, index, ctx)?;
    number(primitive, &value)
}

pub fn eval_agentset(
    args: &[Expr],
    index: usize,
    primitive: &str,
    ctx: &mut Context<'_, '_>,
) -> Result<AgentSet> {
    let value = eval_at(args, index, ctx)?;
    agentset(primitive, value)
}

pub fn number(primitive: &str, value: &Value) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| error::type_mismatch(&primitive.to_uppercase(), "a number", value))
}

pub fn boolean(primitive: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| error::type_mismatch(&primitive.to_uppercase(), "TRUE or FALSE", value))
}

pub fn agentset(primitive: &str, value: Value) -> Result<AgentSet> {
    match value {
        Value::AgentSet(set) => Ok(set),
        other => Err(error::type_mismatch(&primitive.to_uppercase(), "an agentset", &other)),
    }
}

/// An agent set, or a single agent as a one-agent set
pub fn agent_or_set(primitive: &str, value: Value) -> Result<AgentSet> {
    match value {
        Value::AgentSet(set) => Ok(set),
        Value::Agent(agent) => Ok(AgentSet::from_agent(agent)),
        other => Err(error::type_mismatch(
            &primitive.to_uppercase(),
            "an agent or agentset",
            &other,
        )),
    }
}

/// A non-negative count; fractions are truncated
pub fn count(primitive: &str, value: &Value) -> Result<usize> {
    let n = number(primitive, value)?;
    Ok(if n > 0.0 { n.trunc() as usize } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentKind, AgentRef};

    #[test]
    fn test_number_mismatch_message() {
        let err = number("random", &Value::from("x")).unwrap_err();
        assert_eq!(err.kind(), error::ErrorKind::Runtime);
        assert_eq!(
            err.message(),
            "RANDOM expected input to be a number but got the string x instead."
        );

        let err = number("random", &Value::Nobody).unwrap_err();
        assert!(err.message().contains("got NOBODY instead"));
    }

    #[test]
    fn test_agent_or_set() {
        let set = agent_or_set("ask", Value::Agent(AgentRef::turtle(1))).unwrap();
        assert_eq!(set.kind(), AgentKind::Turtle);
        assert_eq!(set.len(), 1);
        assert!(agent_or_set("ask", Value::Number(1.0)).is_err());
    }

    #[test]
    fn test_count_truncates() {
        assert_eq!(count("repeat", &Value::Number(2.7)).unwrap(), 2);
        assert_eq!(count("repeat", &Value::Number(-3.0)).unwrap(), 0);
    }
}
