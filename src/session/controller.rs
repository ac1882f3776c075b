//! Session command loop.
//!
//! Owns the session, applies commands from presentation layers, and drives automatic
//! stepping. The stepped-mode timer is a `tokio::time::Interval` owned by the loop; it is
//! dropped and rebuilt whenever the session's activity, speed or engine changes.

use super::driver;
use super::state::Session;
use crate::model::{Regime, RunConfig, SessionEvent, Speed};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Commands emitted by UI layers to control the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UiCommand {
    /// Start, or restart with a fresh engine.
    Start,
    Stop,
    Step,
    SetSpeed(Speed),
    Inject(char),
    Quit,
}

/// What the current cadence timer was armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmKey {
    active: bool,
    speed: Speed,
    generation: u64,
}

struct Controller {
    program: String,
    cfg: RunConfig,
    session: Session,
    event_tx: UnboundedSender<SessionEvent>,
    cadence: Option<Interval>,
    armed_for: Option<ArmKey>,
}

impl Controller {
    fn new(program: String, cfg: RunConfig, event_tx: UnboundedSender<SessionEvent>) -> Self {
        Self {
            program,
            cfg,
            session: Session::new(),
            event_tx,
            cadence: None,
            armed_for: None,
        }
    }

    fn notify(&self) {
        driver::notify(&self.session, &self.event_tx);
    }

    fn info(&self, msg: impl Into<String>) {
        let _ = self.event_tx.send(SessionEvent::Info(msg.into()));
    }

    fn handle(&mut self, cmd: UiCommand) {
        let res = match cmd {
            UiCommand::Start => {
                self.session.start(&self.program, &self.cfg, &self.event_tx);
                self.notify();
                Ok(())
            }
            UiCommand::Stop => {
                self.session.stop();
                self.notify();
                Ok(())
            }
            UiCommand::SetSpeed(speed) => {
                if speed != self.session.speed() {
                    self.session.set_speed(speed);
                    self.notify();
                }
                Ok(())
            }
            UiCommand::Step => driver::step(&mut self.session, &self.event_tx),
            UiCommand::Inject(c) => {
                driver::inject_instruction(&mut self.session, c, &self.event_tx)
            }
            UiCommand::Quit => Ok(()),
        };

        if let Err(e) = res {
            warn!(error = %e, ?cmd, "command rejected");
            self.info(format!("{e}"));
        }

        self.settle();
    }

    fn tick(&mut self) {
        if let Err(e) = driver::scheduled_step(&mut self.session, &self.event_tx) {
            // The timer only exists while a session is active.
            warn!(error = %e, "cadence fired without a session");
        }
        self.settle();
    }

    /// Run a pending blocking burst, then bring the timer in line with the session.
    fn settle(&mut self) {
        if self.session.is_active() && self.session.speed().regime() == Regime::Blocking {
            if let Err(e) = driver::run_blocking(&mut self.session, &self.event_tx) {
                warn!(error = %e, "blocking run rejected");
            }
        }
        self.rearm();
    }

    fn rearm(&mut self) {
        let key = ArmKey {
            active: self.session.is_active(),
            speed: self.session.speed(),
            generation: self.session.generation(),
        };
        if self.armed_for == Some(key) {
            return;
        }
        self.armed_for = Some(key);

        self.cadence = match key.speed.cadence() {
            Some(period) if key.active => {
                debug!(?period, speed = %key.speed, "arming cadence");
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Some(interval)
            }
            _ => {
                if self.cadence.is_some() {
                    debug!("cadence cancelled");
                }
                None
            }
        };
    }
}

/// Apply UI commands to a session until `Quit` (or the command channel closes), stepping
/// automatically according to the current speed.
pub(crate) async fn run_controller(
    program: String,
    cfg: RunConfig,
    event_tx: UnboundedSender<SessionEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let start_on_launch = cfg.start_on_launch;
    let mut ctl = Controller::new(program, cfg, event_tx);
    if start_on_launch {
        ctl.handle(UiCommand::Start);
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Quit) | None => break,
                    Some(cmd) => ctl.handle(cmd),
                }
            }
            _ = async {
                match ctl.cadence.as_mut() {
                    Some(interval) => {
                        interval.tick().await;
                    }
                    None => futures::future::pending::<()>().await,
                }
            } => {
                ctl.tick();
            }
        }
    }

    ctl.session.stop();
    Ok(())
}
