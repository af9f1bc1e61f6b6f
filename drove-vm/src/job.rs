//! # Jobs
//!
//! A job binds an agent set to an entry point of a procedure and owns the
//! random stream its agents draw from.
//!
//! - **Concurrent jobs** are stepped by the scheduler: each step visits every
//!   pending agent once and runs it until it executes a switching instruction
//!   or reaches its terminal marker.
//! - **Exclusive jobs** are run synchronously by a primitive (`ask`,
//!   `carefully`, ...): every agent runs to its terminal marker before the
//!   next one starts.

use crate::agent::{AgentRef, AgentSet};
use crate::context::{Context, Handle};
use crate::error::{self, Error, Result};
use crate::frame::{CallStack, Frame, MAX_CALL_DEPTH};
use crate::random::SharedRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of one concurrent step
#[derive(Debug)]
pub enum StepOutcome {
    /// Some agents still have work pending
    Continuing,
    /// Every agent reached its terminal marker
    Finished,
    /// A runtime error aborted the job
    Failed(Error),
}

impl StepOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, StepOutcome::Finished)
    }
}

/// Engine resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Frames per agent
    pub max_call_depth: usize,
    /// Exclusive jobs nested inside each other
    pub max_nesting: usize,
    /// Steps [`Engine::run`](crate::engine::Engine::run) takes before giving up
    pub max_steps: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_call_depth: MAX_CALL_DEPTH,
            max_nesting: 64,
            max_steps: 100_000,
        }
    }
}

/// Cancellation flag, observed between primitives
#[derive(Debug, Clone, Default)]
pub struct HaltFlag(Arc<AtomicBool>);

impl HaltFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pending work of one agent between steps
#[derive(Debug, Clone)]
pub struct Cursor {
    pub agent: AgentRef,
    pub ip: usize,
    pub frames: CallStack,
    /// Call depth at which the agent's block ends
    pub base_depth: usize,
    pub error_message: Option<String>,
}

/// One schedulable execution unit
#[derive(Debug)]
pub struct Job {
    pub agentset: AgentSet,
    /// Procedure the agents start in
    pub procedure: usize,
    pub entry: usize,
    pub random: SharedRandom,
    cursors: Option<Vec<Cursor>>,
    steps: usize,
}

impl Job {
    pub fn new(agentset: AgentSet, procedure: usize, entry: usize, random: SharedRandom) -> Self {
        Job {
            agentset,
            procedure,
            entry,
            random,
            cursors: None,
            steps: 0,
        }
    }

    /// Whether every agent is done
    pub fn is_finished(&self) -> bool {
        self.cursors.as_ref().is_some_and(|c| c.is_empty())
    }

    /// Agents with work left; all of them before the first step
    pub fn pending(&self) -> usize {
        match &self.cursors {
            Some(cursors) => cursors.len(),
            None => self.agentset.len(),
        }
    }

    /// Steps taken so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Drop all pending work
    pub fn abort(&mut self) {
        self.cursors = Some(Vec::new());
    }

    fn start(&mut self, handle: &Handle<'_>) -> Result<Vec<Cursor>> {
        let procedure = handle.program.procedure(self.procedure)?;
        let order = self.agentset.visit_order(&mut self.random.borrow_mut());
        tracing::debug!(
            procedure = %procedure.name,
            agents = order.len(),
            "job started"
        );
        let base = Frame::new(self.procedure, procedure.locals, 0);
        Ok(order
            .into_iter()
            .map(|agent| Cursor {
                agent,
                ip: self.entry,
                frames: CallStack::with_max_depth(base.clone(), handle.limits.max_call_depth),
                base_depth: 1,
                error_message: None,
            })
            .collect())
    }
}

/// Run one concurrent step of `job`. Returns true once every agent is done.
///
/// On error the job is aborted and the error returned as is.
pub fn step(handle: &mut Handle<'_>, job: &mut Job) -> Result<bool> {
    let cursors = match job.cursors.take() {
        Some(cursors) => cursors,
        None => job.start(handle)?,
    };
    job.steps += 1;

    let mut pending = Vec::with_capacity(cursors.len());
    for cursor in cursors {
        if !handle.world.is_alive(cursor.agent) {
            continue;
        }
        let mut ctx = Context::resume(handle, job, cursor);
        if let Err(err) = ctx.run_until_switch() {
            job.abort();
            return Err(err);
        }
        if !ctx.finished {
            pending.push(ctx.into_cursor());
        }
    }

    let finished = pending.is_empty();
    job.cursors = Some(pending);
    if finished {
        tracing::debug!(steps = job.steps, "job finished");
    }
    Ok(finished)
}

/// Run an exclusive job to completion.
///
/// Every agent starts from `frames`, so it sees the enclosing context's
/// locals, and hands its frames on to the next agent when it finishes.
/// Agents that died before their turn are skipped.
pub fn run_exclusive(
    handle: &mut Handle<'_>,
    frames: &mut CallStack,
    agentset: AgentSet,
    entry: usize,
    random: SharedRandom,
) -> Result<()> {
    if handle.nesting >= handle.limits.max_nesting {
        return Err(error::nesting_too_deep(handle.limits.max_nesting));
    }
    let procedure = frames.top().procedure;
    let mut job = Job::new(agentset, procedure, entry, random);
    let order = job.agentset.visit_order(&mut job.random.borrow_mut());
    tracing::debug!(agents = order.len(), entry, depth = handle.nesting + 1, "running nested job");

    handle.nesting += 1;
    let result = run_agents(handle, frames, &mut job, order, entry);
    handle.nesting -= 1;
    job.abort();
    result
}

fn run_agents(
    handle: &mut Handle<'_>,
    frames: &mut CallStack,
    job: &mut Job,
    order: Vec<AgentRef>,
    entry: usize,
) -> Result<()> {
    for agent in order {
        if !handle.world.is_alive(agent) {
            continue;
        }
        let cursor = Cursor {
            agent,
            ip: entry,
            frames: frames.clone(),
            base_depth: frames.len(),
            error_message: None,
        };
        let depth = frames.len();
        let mut ctx = Context::resume(handle, job, cursor);
        let result = ctx.run_to_completion();
        // locals written before a failure stay visible to the enclosing context
        let mut nested = ctx.into_cursor().frames;
        nested.unwind_to(depth);
        *frames = nested;
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halt_flag_is_shared() {
        let flag = HaltFlag::new();
        let other = flag.clone();
        other.raise();
        assert!(flag.is_raised());
        flag.clear();
        assert!(!other.is_raised());
    }

    #[test]
    fn test_new_job_is_pending() {
        use crate::agent::AgentKind;
        use crate::random::RandomStream;

        let mut builder = AgentSet::builder(AgentKind::Patch);
        builder.add(AgentRef::patch(0));
        builder.add(AgentRef::patch(1));
        let mut job = Job::new(builder.build(), 0, 0, RandomStream::shared(1));

        assert_eq!(job.pending(), 2);
        assert!(!job.is_finished());

        job.abort();
        assert!(job.is_finished());
        assert_eq!(job.pending(), 0);
    }

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_call_depth, MAX_CALL_DEPTH);
        assert!(limits.max_nesting > 0);
    }
}
