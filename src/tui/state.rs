use crate::model::{SessionEvent, Snapshot, Speed};

/// Program output kept for display; older bytes are dropped.
const MAX_OUTPUT: usize = 64 * 1024;

pub struct UiState {
    pub show_help: bool,
    pub info: String,
    pub program_name: String,
    pub last: Snapshot,
    pub output: Vec<u8>,
    /// `i` was pressed; the next character typed is injected.
    pub inject_pending: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            show_help: false,
            info: String::new(),
            program_name: String::new(),
            last: Snapshot::default(),
            output: Vec::new(),
            inject_pending: false,
        }
    }
}

impl UiState {
    pub fn apply_event(&mut self, ev: SessionEvent) {
        match ev {
            SessionEvent::Snapshot(snap) => {
                // output queued before a restart belongs to the old engine
                if snap.generation != self.last.generation {
                    self.output.clear();
                }
                self.last = *snap;
            }
            SessionEvent::Output(byte) => self.push_output(byte),
            SessionEvent::Info(msg) => self.info = msg,
        }
    }

    fn push_output(&mut self, byte: u8) {
        self.output.push(byte);
        if self.output.len() > MAX_OUTPUT {
            let _ = self.output.drain(0..(self.output.len() - MAX_OUTPUT));
        }
    }

    /// Speed after nudging the current one by `delta`, clamped to the stepped range.
    /// Super speed and out-of-range values count as idle.
    pub fn nudged_speed(&self, delta: i32) -> Speed {
        let base = self.last.speed.0.clamp(0, Speed::FASTEST.0);
        Speed((base + delta).clamp(0, Speed::FASTEST.0))
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn reset_run(&mut self) {
        self.inject_pending = false;
    }
}
