//! # Call Frames
//!
//! Each agent executing a procedure owns a stack of frames, one per active
//! procedure call. A frame holds the procedure's local slots (inputs first)
//! and the instruction to return to.

use crate::error::{self, Result};
use crate::value::Value;

/// Maximum call depth (prevents runaway recursion)
pub const MAX_CALL_DEPTH: usize = 256;

/// One active procedure call
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Index of the running procedure
    pub procedure: usize,
    pub locals: Vec<Value>,
    /// Caller's instruction to continue at
    pub return_ip: usize,
}

impl Frame {
    pub fn new(procedure: usize, locals: usize, return_ip: usize) -> Self {
        Frame {
            procedure,
            locals: vec![Value::Number(0.0); locals],
            return_ip,
        }
    }

    /// Read a local slot
    pub fn get(&self, slot: usize) -> Result<&Value> {
        self.locals.get(slot).ok_or_else(|| local_out_of_range(slot))
    }

    /// Write a local slot
    pub fn set(&mut self, slot: usize, value: Value) -> Result<()> {
        let local = self.locals.get_mut(slot).ok_or_else(|| local_out_of_range(slot))?;
        *local = value;
        Ok(())
    }
}

fn local_out_of_range(slot: usize) -> crate::error::Error {
    error::internal_consistency(format!("local slot {} does not exist", slot))
}

/// Stack of frames; never empty
#[derive(Debug, Clone, PartialEq)]
pub struct CallStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl CallStack {
    /// Create a stack holding only `base`
    pub fn new(base: Frame) -> Self {
        Self::with_max_depth(base, MAX_CALL_DEPTH)
    }

    pub fn with_max_depth(base: Frame, max_depth: usize) -> Self {
        let mut frames = Vec::with_capacity(8);
        frames.push(base);
        CallStack { frames, max_depth }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; kept for symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Enter a procedure
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() >= self.max_depth {
            return Err(error::call_depth_exceeded(self.max_depth));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Leave a procedure. The base frame cannot be popped.
    pub fn pop(&mut self) -> Result<Frame> {
        if self.frames.len() <= 1 {
            return Err(error::internal_consistency("returned past the base frame"));
        }
        self.frames
            .pop()
            .ok_or_else(|| error::internal_consistency("call stack is empty"))
    }

    /// Drop every frame above `depth`, keeping at least the base frame
    pub fn unwind_to(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }

    /// The running procedure's frame
    pub fn top(&self) -> &Frame {
        let last = self.frames.len() - 1;
        &self.frames[last]
    }

    pub fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}
