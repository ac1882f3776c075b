//! Virtual machine contract consumed by the session layer, plus the Brainfuck interpreter
//! that implements it.
//!
//! The session never looks inside an engine beyond this trait: it steps it, injects single
//! instructions into it, and reads `program_text`, `program_counter` and `reached_end` for
//! display.

mod input;
mod interpreter;
mod program;

pub use input::QueuedInput;
pub use interpreter::Interpreter;

use crate::model::EngineSnapshot;
use std::sync::Arc;
use thiserror::Error;

/// Number of executable instructions in `text`; everything else is a comment.
pub fn instruction_count(text: &str) -> usize {
    text.chars().filter_map(program::Instr::decode).count()
}

/// Instruction character at `position` of `text`, if that slot holds one.
pub fn instruction_at(text: &str, position: usize) -> Option<char> {
    text.chars()
        .nth(position)
        .filter(|c| program::Instr::decode(*c).is_some())
}

/// Raised by an [`InputProvider`] when a read instruction needs a byte and none remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("input exhausted")]
pub struct InputExhausted;

/// Errors raised by an engine while executing an instruction.
///
/// The `Display` text is what ends up in the session status line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFault {
    #[error("tape underflow")]
    TapeUnderflow,
    #[error("tape overflow")]
    TapeOverflow,
    #[error("unmatched '[' at position {0}")]
    UnmatchedOpen(usize),
    #[error("unmatched ']' at position {0}")]
    UnmatchedClose(usize),
    #[error("unrecognized instruction {0:?}")]
    Unrecognized(char),
    #[error("loop instruction {0:?} cannot be executed on its own")]
    DetachedLoop(char),
    #[error("program has already finished")]
    Finished,
    #[error(transparent)]
    Input(#[from] InputExhausted),
}

/// Supplies bytes to `,` instructions. Must never block.
pub trait InputProvider {
    fn next_byte(&mut self) -> Result<u8, InputExhausted>;
}

/// Receives bytes written by `.` instructions.
pub trait OutputSink {
    fn put(&mut self, byte: u8);
}

impl<F: FnMut(u8)> OutputSink for F {
    fn put(&mut self, byte: u8) {
        self(byte)
    }
}

/// The machine being driven.
pub trait Engine {
    /// Execute the instruction under the program counter and advance past it.
    fn step(&mut self) -> Result<(), ExecutionFault>;

    /// Execute a single instruction character without consulting or moving the
    /// program counter.
    fn execute(&mut self, instruction: char) -> Result<(), ExecutionFault>;

    fn program_text(&self) -> &Arc<str>;

    fn program_counter(&self) -> usize;

    fn reached_end(&self) -> bool;

    /// Read-only view for observers. Engines with richer state override this.
    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            program: Arc::clone(self.program_text()),
            program_counter: self.program_counter(),
            reached_end: self.reached_end(),
            ..Default::default()
        }
    }

    /// Execution count per program position. Empty when the engine does not profile.
    fn profile(&self) -> Vec<u64> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_not_instructions() {
        assert_eq!(instruction_count("+ add\n[-]"), 4);
        assert_eq!(instruction_count("hello"), 0);
        assert_eq!(instruction_at("a+b", 1), Some('+'));
        assert_eq!(instruction_at("a+b", 0), None);
        assert_eq!(instruction_at("a+b", 9), None);
    }

    #[test]
    fn input_fault_reads_like_the_input_error() {
        let fault = ExecutionFault::from(InputExhausted);
        assert_eq!(fault.to_string(), "input exhausted");
    }
}
