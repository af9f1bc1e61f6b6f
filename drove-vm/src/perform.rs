//! # Command Dispatch
//!
//! [`perform`] is the generic entry point: it evaluates the instruction's
//! arguments and carries out the command. [`perform_1`] takes the single
//! argument of a unary command already evaluated; the interpreter loop calls
//! it directly for instructions whose argument was a constant. Both leave
//! the context in the same state for the same inputs.
//!
//! Every command sets the instruction pointer before it returns, or marks
//! the context finished.

use crate::agent::{AgentKind, AgentSet};
use crate::args;
use crate::assembler::Instruction;
use crate::context::Context;
use crate::error::{self, ErrorKind, Result};
use crate::frame::Frame;
use crate::job;
use crate::prim::Command;
use crate::random::RandomScope;
use crate::value::Value;
use crate::vars;
use crate::world::SpringParams;

/// Carry out `instr`, evaluating its arguments
pub fn perform(instr: &Instruction, ctx: &mut Context<'_, '_>) -> Result<()> {
    if instr.command.is_unary() {
        let arg0 = args::eval_at(&instr.args, 0, ctx)?;
        return perform_1(instr, ctx, arg0);
    }

    match &instr.command {
        Command::WithLocalRandomness => with_local_randomness(instr, ctx),
        Command::Carefully => carefully(instr, ctx),
        Command::Call { index, .. } => call(instr, *index, ctx),
        Command::Stop | Command::Return => leave(ctx),
        Command::Die => {
            ctx.handle.world.kill(ctx.agent)?;
            ctx.finished = true;
            Ok(())
        }
        Command::LayoutSpring => layout_spring(instr, ctx),
        Command::Goto => {
            ctx.ip = instr.offset;
            Ok(())
        }
        Command::RepeatCheck { slot } => {
            let left = args::number("repeat", &ctx.local(*slot)?)?;
            if left <= 0.0 {
                ctx.ip = instr.offset;
            } else {
                ctx.set_local(*slot, Value::Number(left - 1.0))?;
                ctx.ip = instr.next;
            }
            Ok(())
        }
        Command::Done => {
            ctx.finished = true;
            Ok(())
        }
        other => Err(error::internal_consistency(format!(
            "{} has no generic entry point",
            other.token()
        ))),
    }
}

/// Carry out a unary `instr` with its argument already evaluated
pub fn perform_1(instr: &Instruction, ctx: &mut Context<'_, '_>, arg0: Value) -> Result<()> {
    let token = instr.command.token();
    if let Some((kind, vn)) = instr.command.variable_kind() {
        let target = vars::target(&*ctx.handle.world, ctx.agent, kind, token)?;
        vars::set(&mut *ctx.handle.world, &mut *ctx.handle.notifier, target, vn, arg0)?;
        ctx.ip = instr.next;
        return Ok(());
    }

    match &instr.command {
        Command::Let { slot } | Command::SetLocal { slot } => {
            ctx.set_local(*slot, arg0)?;
            ctx.ip = instr.next;
        }
        Command::Print => {
            ctx.handle.notifier.output(&arg0.to_string());
            ctx.ip = instr.next;
        }
        Command::Ask => {
            if let Value::Agent(agent) = &arg0 {
                if !ctx.handle.world.is_alive(*agent) {
                    return Err(error::agent_dead(agent.to_string()));
                }
            }
            let agentset = args::agent_or_set(token, arg0)?;
            let random = ctx.job.random.clone();
            job::run_exclusive(ctx.handle, &mut ctx.frames, agentset, instr.next, random)?;
            ctx.ip = instr.offset;
        }
        Command::CreateTurtles => {
            if ctx.agent.kind != AgentKind::Observer {
                return Err(error::wrong_agent(token, ctx.agent.kind));
            }
            let count = args::count(token, &arg0)?;
            let created = ctx
                .handle
                .world
                .create_turtles(count, &mut ctx.job.random.borrow_mut())?;
            let random = ctx.job.random.clone();
            job::run_exclusive(ctx.handle, &mut ctx.frames, created, instr.next, random)?;
            ctx.ip = instr.offset;
        }
        Command::If => {
            ctx.ip = if args::boolean(token, &arg0)? { instr.next } else { instr.offset };
        }
        Command::IfElse => {
            ctx.ip = if args::boolean(token, &arg0)? { instr.next } else { instr.alternate };
        }
        Command::While => {
            ctx.ip = if args::boolean(token, &arg0)? { instr.next } else { instr.offset };
        }
        Command::Repeat { slot } => {
            let count = args::count(token, &arg0)?;
            ctx.set_local(*slot, Value::Number(count as f64))?;
            ctx.ip = instr.next;
        }
        other => {
            return Err(error::internal_consistency(format!(
                "{} is not a unary command",
                other.token()
            )))
        }
    }
    Ok(())
}

/// Return from a call, or end the agent's block at base depth
fn leave(ctx: &mut Context<'_, '_>) -> Result<()> {
    if ctx.at_base() {
        ctx.finished = true;
    } else {
        let frame = ctx.frames.pop()?;
        ctx.ip = frame.return_ip;
    }
    Ok(())
}

fn call(instr: &Instruction, index: usize, ctx: &mut Context<'_, '_>) -> Result<()> {
    let locals = ctx.handle.program.procedure(index)?.locals;
    let mut frame = Frame::new(index, locals, instr.next);
    for (slot, expr) in instr.args.iter().enumerate() {
        let value = args::eval(expr, ctx)?;
        frame.set(slot, value)?;
    }
    ctx.frames.push(frame)?;
    ctx.ip = 0;
    Ok(())
}

/// Run the block with a clone of the main random stream, so draws inside it
/// leave the job's own stream untouched
fn with_local_randomness(instr: &Instruction, ctx: &mut Context<'_, '_>) -> Result<()> {
    let replacement = ctx.handle.world.main_random().borrow().clone().into_shared();
    let agentset = AgentSet::from_agent(ctx.agent);

    let Context { handle, job: current, frames, .. } = ctx;
    let scope = RandomScope::enter(&mut current.random, replacement);
    job::run_exclusive(&mut **handle, frames, agentset, instr.next, scope.current().clone())?;
    drop(scope);

    ctx.ip = instr.offset;
    Ok(())
}

/// Run the first block; on a runtime error continue at the second with the
/// error's message available to `error-message`
fn carefully(instr: &Instruction, ctx: &mut Context<'_, '_>) -> Result<()> {
    let agentset = AgentSet::from_agent(ctx.agent);
    let random = ctx.job.random.clone();
    match job::run_exclusive(ctx.handle, &mut ctx.frames, agentset, instr.next, random) {
        Ok(()) => ctx.ip = instr.offset,
        Err(err) if err.kind() == ErrorKind::Runtime => {
            tracing::debug!(error = %err, "carefully caught error");
            ctx.error_message = Some(err.message().to_string());
            ctx.ip = instr.alternate;
        }
        Err(err) => return Err(err),
    }
    Ok(())
}

fn layout_spring(instr: &Instruction, ctx: &mut Context<'_, '_>) -> Result<()> {
    let token = instr.command.token();
    let nodes = args::eval_agentset(&instr.args, 0, token, ctx)?;
    let links = args::eval_agentset(&instr.args, 1, token, ctx)?;
    let params = SpringParams {
        spring_constant: args::eval_number(&instr.args, 2, token, ctx)?,
        spring_length: args::eval_number(&instr.args, 3, token, ctx)?,
        repulsion_constant: args::eval_number(&instr.args, 4, token, ctx)?,
    };
    if nodes.kind() != AgentKind::Turtle {
        return Err(error::type_mismatch(&token.to_uppercase(), "a turtle agentset", &Value::AgentSet(nodes)));
    }
    if links.kind() != AgentKind::Link {
        return Err(error::type_mismatch(&token.to_uppercase(), "a link agentset", &Value::AgentSet(links)));
    }
    let written = ctx
        .handle
        .world
        .layout_spring(&nodes, &links, params, &mut ctx.job.random.borrow_mut())?;
    for (turtle, slot) in written {
        let value = ctx.handle.world.get_variable(turtle, slot)?;
        ctx.handle.notifier.variable_changed(turtle, slot, &value);
    }
    ctx.ip = instr.next;
    Ok(())
}
