use super::{InputExhausted, InputProvider};
use std::collections::VecDeque;

/// Input provider over a fixed queue of bytes collected up front.
#[derive(Debug, Clone, Default)]
pub struct QueuedInput {
    bytes: VecDeque<u8>,
}

impl QueuedInput {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into().into(),
        }
    }
}

impl From<&str> for QueuedInput {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl InputProvider for QueuedInput {
    fn next_byte(&mut self) -> Result<u8, InputExhausted> {
        self.bytes.pop_front().ok_or(InputExhausted)
    }
}
