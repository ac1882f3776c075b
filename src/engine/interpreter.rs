use super::program::{Instr, Program};
use super::{Engine, ExecutionFault, InputProvider, OutputSink};
use crate::model::{EngineSnapshot, RunConfig, TapePolicy};
use std::num::Wrapping;
use std::sync::Arc;

/// Cells shown on each side of the pointer in snapshots.
const TAPE_WINDOW: usize = 16;

/// Single-stepping Brainfuck interpreter.
pub struct Interpreter {
    text: Arc<str>,
    program: Program,
    /// Always on an instruction or at `program.len()`.
    pc: usize,
    ptr: usize,
    tape: Vec<Wrapping<u8>>,
    policy: TapePolicy,
    input: Box<dyn InputProvider + Send>,
    output: Box<dyn OutputSink + Send>,
    steps: u64,
    profile: Vec<u64>,
}

impl Interpreter {
    pub fn new(
        text: &str,
        cfg: &RunConfig,
        input: Box<dyn InputProvider + Send>,
        output: Box<dyn OutputSink + Send>,
    ) -> Self {
        let program = Program::new(text);
        let pc = program.next_instr(0);
        let profile = vec![0; program.len()];
        Self {
            text: Arc::from(text),
            program,
            pc,
            ptr: 0,
            tape: vec![Wrapping(0); cfg.tape_len.max(1)],
            policy: cfg.tape_policy,
            input,
            output,
            steps: 0,
            profile,
        }
    }

    fn elem(&self) -> u8 {
        self.tape[self.ptr].0
    }

    fn elem_mut(&mut self) -> &mut Wrapping<u8> {
        &mut self.tape[self.ptr]
    }

    fn move_right(&mut self) -> Result<(), ExecutionFault> {
        if self.ptr + 1 < self.tape.len() {
            self.ptr += 1;
            return Ok(());
        }
        match self.policy {
            TapePolicy::Strict => Err(ExecutionFault::TapeOverflow),
            TapePolicy::Wrap => {
                self.ptr = 0;
                Ok(())
            }
        }
    }

    fn move_left(&mut self) -> Result<(), ExecutionFault> {
        if self.ptr > 0 {
            self.ptr -= 1;
            return Ok(());
        }
        match self.policy {
            TapePolicy::Strict => Err(ExecutionFault::TapeUnderflow),
            TapePolicy::Wrap => {
                self.ptr = self.tape.len() - 1;
                Ok(())
            }
        }
    }

    /// Run a non-loop instruction against the tape.
    fn apply(&mut self, instr: Instr) -> Result<(), ExecutionFault> {
        match instr {
            Instr::Add => *self.elem_mut() += Wrapping(1),
            Instr::Sub => *self.elem_mut() -= Wrapping(1),
            Instr::Right => self.move_right()?,
            Instr::Left => self.move_left()?,
            Instr::Out => {
                let byte = self.elem();
                self.output.put(byte);
            }
            Instr::In => {
                let byte = self.input.next_byte()?;
                *self.elem_mut() = Wrapping(byte);
            }
            Instr::LoopStart => return Err(ExecutionFault::DetachedLoop('[')),
            Instr::LoopEnd => return Err(ExecutionFault::DetachedLoop(']')),
        }
        Ok(())
    }
}

impl Engine for Interpreter {
    fn step(&mut self) -> Result<(), ExecutionFault> {
        let pos = self.pc;
        let Some(instr) = self.program.instr_at(pos) else {
            return Err(ExecutionFault::Finished);
        };

        // A faulting instruction leaves pc, the step counter and the profile untouched.
        let next = match instr {
            Instr::LoopStart => {
                let end = self
                    .program
                    .partner(pos)
                    .ok_or(ExecutionFault::UnmatchedOpen(pos))?;
                if self.elem() == 0 {
                    end + 1
                } else {
                    pos + 1
                }
            }
            Instr::LoopEnd => {
                let start = self
                    .program
                    .partner(pos)
                    .ok_or(ExecutionFault::UnmatchedClose(pos))?;
                if self.elem() != 0 {
                    start + 1
                } else {
                    pos + 1
                }
            }
            other => {
                self.apply(other)?;
                pos + 1
            }
        };

        self.profile[pos] += 1;
        self.steps += 1;
        self.pc = self.program.next_instr(next);
        Ok(())
    }

    fn execute(&mut self, instruction: char) -> Result<(), ExecutionFault> {
        let instr = Instr::decode(instruction).ok_or(ExecutionFault::Unrecognized(instruction))?;
        self.apply(instr)
    }

    fn program_text(&self) -> &Arc<str> {
        &self.text
    }

    fn program_counter(&self) -> usize {
        self.pc
    }

    fn reached_end(&self) -> bool {
        self.pc >= self.program.len()
    }

    fn snapshot(&self) -> EngineSnapshot {
        let tape_start = self.ptr.saturating_sub(TAPE_WINDOW);
        let tape_end = (self.ptr + TAPE_WINDOW + 1).min(self.tape.len());
        EngineSnapshot {
            program: Arc::clone(&self.text),
            program_counter: self.pc,
            reached_end: self.reached_end(),
            pointer: self.ptr,
            tape_start,
            tape: self.tape[tape_start..tape_end].iter().map(|c| c.0).collect(),
            steps: self.steps,
        }
    }

    fn profile(&self) -> Vec<u64> {
        self.profile.clone()
    }
}

#[cfg(test)]
impl Interpreter {
    fn pointer(&self) -> usize {
        self.ptr
    }

    fn cell(&self, idx: usize) -> Option<u8> {
        self.tape.get(idx).map(|c| c.0)
    }

    fn steps(&self) -> u64 {
        self.steps
    }
}
