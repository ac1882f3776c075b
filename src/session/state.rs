//! Session lifecycle: engine ownership, speed, timing and the status line.

use crate::engine::{Engine, Interpreter, QueuedInput};
use crate::model::{RunConfig, SessionEvent, Snapshot, Speed};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no active session")]
    NoActiveSession,
}

/// One run of one program against one engine.
pub struct Session<E = Interpreter> {
    pub(super) engine: Option<E>,
    pub(super) active: bool,
    pub(super) speed: Speed,
    pub(super) started_at: Instant,
    pub(super) status: Option<String>,
    pub(super) faulted: bool,
    /// Bumped every time the engine is replaced.
    pub(super) generation: u64,
}

impl<E> Default for Session<E> {
    fn default() -> Self {
        Self {
            engine: None,
            active: false,
            speed: Speed::IDLE,
            started_at: Instant::now(),
            status: None,
            faulted: false,
            generation: 0,
        }
    }
}

/// Speed a fresh session starts at.
pub fn initial_speed(cfg: &RunConfig) -> Speed {
    match (cfg.direct_start, cfg.start_super_speed) {
        (true, true) => Speed::BLOCKING,
        (true, false) => Speed::FASTEST,
        (false, _) => Speed::IDLE,
    }
}

impl<E: Engine> Session<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any previous engine with `engine` and begin a new run.
    pub fn start_with(&mut self, engine: E, cfg: &RunConfig) {
        self.engine = Some(engine);
        self.generation += 1;
        self.speed = initial_speed(cfg);
        self.started_at = Instant::now();
        self.status = None;
        self.faulted = false;
        self.active = true;
        info!(generation = self.generation, speed = %self.speed, "session started");
    }

    /// End the run and discard the engine. Safe to call when nothing is running.
    pub fn stop(&mut self) {
        if self.active {
            info!(generation = self.generation, "session stopped");
        }
        self.active = false;
        self.engine = None;
        self.status = None;
        self.faulted = false;
    }

    /// Range checks are the caller's responsibility.
    pub fn set_speed(&mut self, speed: Speed) {
        self.speed = speed;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(super) fn active_engine_mut(&mut self) -> Result<&mut E, SessionError> {
        match self.engine.as_mut() {
            Some(engine) if self.active => Ok(engine),
            _ => Err(SessionError::NoActiveSession),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let engine = self.engine.as_ref();
        Snapshot {
            active: self.active,
            generation: self.generation,
            speed: self.speed,
            status: self.status.clone(),
            faulted: self.faulted,
            elapsed: self.elapsed(),
            engine: engine.map(|e| e.snapshot()),
            profile: match (engine, &self.status) {
                (Some(e), Some(_)) => Some(e.profile()),
                _ => None,
            },
        }
    }
}

impl Session<Interpreter> {
    /// Start `program` with a fresh input queue from `cfg.input`. Program output is
    /// forwarded to `events` as it is written.
    pub fn start(
        &mut self,
        program: &str,
        cfg: &RunConfig,
        events: &UnboundedSender<SessionEvent>,
    ) {
        let tx = events.clone();
        let engine = Interpreter::new(
            program,
            cfg,
            Box::new(QueuedInput::new(cfg.input.clone())),
            Box::new(move |byte: u8| {
                let _ = tx.send(SessionEvent::Output(byte));
            }),
        );
        self.start_with(engine, cfg);
    }
}

#[cfg(test)]
impl<E: Engine> Session<E> {
    pub(super) fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub(super) fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }
}
