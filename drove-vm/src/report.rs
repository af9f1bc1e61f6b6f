//! # Reporter Dispatch
//!
//! [`report`] evaluates an expression tree. Unary and binary reporters have
//! [`report_1`]/[`report_2`] entry points taking their arguments already
//! evaluated; [`report`] evaluates the arguments and calls them, so both
//! paths agree by construction. `and`/`or` short-circuit on the generic
//! path only.

use crate::agent::{AgentKind, AgentSet};
use crate::args;
use crate::context::Context;
use crate::error::{self, Result};
use crate::prim::Reporter;
use crate::syntax::Expr;
use crate::value::Value;
use crate::vars;

/// Evaluate `expr`, binding failures to it
pub fn report(expr: &Expr, ctx: &mut Context<'_, '_>) -> Result<Value> {
    evaluate(expr, ctx).map_err(|err| ctx.bind_expr(expr, err))
}

fn evaluate(expr: &Expr, ctx: &mut Context<'_, '_>) -> Result<Value> {
    let token = expr.reporter.token();
    match (&expr.reporter, expr.args.as_slice()) {
        (Reporter::And, [a, b]) => {
            let lhs = args::boolean(token, &report(a, ctx)?)?;
            if !lhs {
                return Ok(Value::Boolean(false));
            }
            let rhs = report(b, ctx)?;
            Ok(Value::Boolean(args::boolean(token, &rhs)?))
        }
        (Reporter::Or, [a, b]) => {
            let lhs = args::boolean(token, &report(a, ctx)?)?;
            if lhs {
                return Ok(Value::Boolean(true));
            }
            let rhs = report(b, ctx)?;
            Ok(Value::Boolean(args::boolean(token, &rhs)?))
        }
        (_, []) => report_0(expr, ctx),
        (_, [a]) => {
            let a = report(a, ctx)?;
            report_1(expr, ctx, a)
        }
        (_, [a, b]) => {
            let a = report(a, ctx)?;
            let b = report(b, ctx)?;
            report_2(expr, ctx, a, b)
        }
        _ => Err(error::internal_consistency(format!(
            "{} called with {} arguments",
            token,
            expr.args.len()
        ))),
    }
}

fn report_0(expr: &Expr, ctx: &mut Context<'_, '_>) -> Result<Value> {
    let token = expr.reporter.token();
    if let Some((kind, vn)) = expr.reporter.variable_kind() {
        let world = &*ctx.handle.world;
        let target = vars::target(world, ctx.agent, kind, token)?;
        return vars::get(world, target, vn);
    }

    match &expr.reporter {
        Reporter::Constant { value } => Ok(value.clone()),
        Reporter::Local { slot } => ctx.local(*slot),
        Reporter::SelfAgent => {
            if ctx.agent.kind == AgentKind::Observer {
                return Err(error::wrong_agent(token, AgentKind::Observer));
            }
            Ok(Value::Agent(ctx.agent))
        }
        Reporter::Turtles => Ok(Value::AgentSet(ctx.handle.world.agents(AgentKind::Turtle))),
        Reporter::Patches => Ok(Value::AgentSet(ctx.handle.world.agents(AgentKind::Patch))),
        Reporter::Links => Ok(Value::AgentSet(ctx.handle.world.agents(AgentKind::Link))),
        Reporter::ErrorMessage => Ok(Value::String(ctx.error_message.clone().unwrap_or_default())),
        Reporter::UnknownIdentifier { name } => Err(error::internal_consistency(format!(
            "unresolved identifier {} reached at run time",
            name
        ))
        .with_context("position", expr.position.to_string())),
        other => Err(error::internal_consistency(format!("{} takes arguments", other.token()))),
    }
}

/// Evaluate a unary reporter with its argument already evaluated
pub fn report_1(expr: &Expr, ctx: &mut Context<'_, '_>, a: Value) -> Result<Value> {
    let token = expr.reporter.token();
    match &expr.reporter {
        Reporter::Count => {
            let set = args::agentset(token, a)?;
            let world = &*ctx.handle.world;
            Ok(Value::Number(set.iter().filter(|&agent| world.is_alive(agent)).count() as f64))
        }
        Reporter::Random => {
            let n = args::number(token, &a)?.trunc();
            let mut random = ctx.job.random.borrow_mut();
            let draw = if n > 0.0 {
                random.next_int(n as u64) as f64
            } else if n < 0.0 {
                -(random.next_int((-n) as u64) as f64)
            } else {
                0.0
            };
            Ok(Value::Number(draw))
        }
        Reporter::RandomFloat => {
            let x = args::number(token, &a)?;
            Ok(Value::Number(x * ctx.job.random.borrow_mut().next_double()))
        }
        Reporter::OneOf => match a {
            Value::AgentSet(set) => {
                let world = &*ctx.handle.world;
                let mut builder = AgentSet::builder(set.kind());
                for agent in set.iter().filter(|&agent| world.is_alive(agent)) {
                    builder.add(agent);
                }
                let live = builder.build();
                let picked = live.random_one(&mut ctx.job.random.borrow_mut());
                Ok(picked.map(Value::Agent).unwrap_or(Value::Nobody))
            }
            Value::List(items) => {
                if items.is_empty() {
                    return Err(error::runtime("ONE-OF got an empty list as input."));
                }
                let index = ctx.job.random.borrow_mut().next_int(items.len() as u64) as usize;
                Ok(items[index].clone())
            }
            other => Err(error::type_mismatch(
                &token.to_uppercase(),
                "a list or agentset",
                &other,
            )),
        },
        Reporter::Not => Ok(Value::Boolean(!args::boolean(token, &a)?)),
        other => Err(error::internal_consistency(format!(
            "{} is not a unary reporter",
            other.token()
        ))),
    }
}

/// Evaluate a binary reporter with its arguments already evaluated
pub fn report_2(expr: &Expr, _ctx: &mut Context<'_, '_>, a: Value, b: Value) -> Result<Value> {
    let token = expr.reporter.token();
    let value = match &expr.reporter {
        Reporter::Equal => Value::Boolean(a == b),
        Reporter::And => Value::Boolean(args::boolean(token, &a)? && args::boolean(token, &b)?),
        Reporter::Or => Value::Boolean(args::boolean(token, &a)? || args::boolean(token, &b)?),
        other => {
            let x = args::number(token, &a)?;
            let y = args::number(token, &b)?;
            match other {
                Reporter::Plus => Value::Number(x + y),
                Reporter::Minus => Value::Number(x - y),
                Reporter::Mult => Value::Number(x * y),
                Reporter::Div => {
                    if y == 0.0 {
                        return Err(error::runtime("Division by zero."));
                    }
                    Value::Number(x / y)
                }
                Reporter::Lt => Value::Boolean(x < y),
                Reporter::Gt => Value::Boolean(x > y),
                _ => {
                    return Err(error::internal_consistency(format!(
                        "{} is not a binary reporter",
                        other.token()
                    )))
                }
            }
        }
    };
    Ok(value)
}
