use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Behaviour when the data pointer moves off either end of the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TapePolicy {
    /// Raise `tape underflow` / `tape overflow`.
    #[default]
    Strict,
    /// Wrap around to the opposite end.
    Wrap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Begin advancing immediately instead of waiting for manual steps.
    pub direct_start: bool,
    /// With `direct_start`, run in blocking mode rather than the fastest stepped cadence.
    pub start_super_speed: bool,
    pub tape_len: usize,
    pub tape_policy: TapePolicy,
    /// Bytes handed to `,` instructions, in order.
    #[serde(default)]
    pub input: Vec<u8>,
    /// Start a session as soon as the controller comes up.
    pub start_on_launch: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            direct_start: true,
            start_super_speed: false,
            tape_len: 32_000,
            tape_policy: TapePolicy::Strict,
            input: Vec::new(),
            start_on_launch: true,
        }
    }
}

/// Which kind of automatic advancement a [`Speed`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Idle,
    Stepped,
    Blocking,
}

/// Playback speed: `0` idle, `1..=100` stepped, `-1` blocking.
///
/// Values outside those ranges are accepted (range checks are the caller's job) and
/// schedule nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Speed(pub i32);

impl Speed {
    pub const IDLE: Speed = Speed(0);
    pub const FASTEST: Speed = Speed(100);
    pub const BLOCKING: Speed = Speed(-1);

    pub fn regime(self) -> Regime {
        match self.0 {
            -1 => Regime::Blocking,
            1..=100 => Regime::Stepped,
            _ => Regime::Idle,
        }
    }

    /// Time between automatic steps: `1000 / (speed * 10)` milliseconds.
    pub fn cadence(self) -> Option<Duration> {
        match self.regime() {
            Regime::Stepped => Some(Duration::from_micros(100_000 / self.0 as u64)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.regime() {
            Regime::Blocking => f.write_str("super"),
            _ => write!(f, "{}", self.0),
        }
    }
}

/// Read-only view of an engine for observers.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub program: Arc<str>,
    pub program_counter: usize,
    pub reached_end: bool,
    pub pointer: usize,
    /// Tape index of `tape[0]`.
    pub tape_start: usize,
    /// Cells around the pointer.
    pub tape: Vec<u8>,
    pub steps: u64,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            program: Arc::from(""),
            program_counter: 0,
            reached_end: false,
            pointer: 0,
            tape_start: 0,
            tape: Vec::new(),
            steps: 0,
        }
    }
}

/// Read-only view of the session, sent after every step, injection and transition.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub active: bool,
    /// Changes each time a fresh engine is started.
    pub generation: u64,
    pub speed: Speed,
    pub status: Option<String>,
    /// Whether `status` describes a fault rather than normal completion.
    pub faulted: bool,
    pub elapsed: Duration,
    pub engine: Option<EngineSnapshot>,
    /// Per-position execution counts, attached once the run has concluded.
    pub profile: Option<Vec<u64>>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Snapshot(Box<Snapshot>),
    /// A byte written by the program.
    Output(u8),
    Info(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotSpot {
    pub position: usize,
    pub instruction: char,
    pub count: u64,
}

/// End-of-run report for headless modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub timestamp_utc: String,
    pub program: String,
    pub instructions: usize,
    pub steps: u64,
    pub reached_end: bool,
    pub faulted: bool,
    pub status: Option<String>,
    pub elapsed_ms: u64,
    pub output: String,
    #[serde(default)]
    pub hot_spots: Vec<HotSpot>,
}
