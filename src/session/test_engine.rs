//! Scripted engine for exercising the session layer without a real program.

use crate::engine::{Engine, ExecutionFault};
use std::sync::Arc;

/// Straight-line program of `len` instructions; optionally faults on the n-th step
/// (1-based) with `tape underflow`.
pub(crate) struct Scripted {
    text: Arc<str>,
    pc: usize,
    len: usize,
    fail_on: Option<usize>,
    pub(crate) step_calls: usize,
    pub(crate) executed: Vec<char>,
}

impl Scripted {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            text: Arc::from("+".repeat(len)),
            pc: 0,
            len,
            fail_on: None,
            step_calls: 0,
            executed: Vec::new(),
        }
    }

    pub(crate) fn failing_on(len: usize, step: usize) -> Self {
        Self {
            fail_on: Some(step),
            ..Self::new(len)
        }
    }

    pub(crate) fn clear_fault(&mut self) {
        self.fail_on = None;
    }
}

impl Engine for Scripted {
    fn step(&mut self) -> Result<(), ExecutionFault> {
        self.step_calls += 1;
        if self.pc >= self.len {
            return Err(ExecutionFault::Finished);
        }
        if self.fail_on == Some(self.pc + 1) {
            return Err(ExecutionFault::TapeUnderflow);
        }
        self.pc += 1;
        Ok(())
    }

    fn execute(&mut self, instruction: char) -> Result<(), ExecutionFault> {
        if instruction == '+' {
            self.executed.push(instruction);
            Ok(())
        } else {
            Err(ExecutionFault::Unrecognized(instruction))
        }
    }

    fn program_text(&self) -> &Arc<str> {
        &self.text
    }

    fn program_counter(&self) -> usize {
        self.pc
    }

    fn reached_end(&self) -> bool {
        self.pc >= self.len
    }
}
