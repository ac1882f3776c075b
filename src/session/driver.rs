//! Turns the current speed into engine advancement and records how it ended.
//!
//! Faults from program-counter-driven stepping halt automatic advancement and land in the
//! status line. Faults from injected instructions are discarded and leave the session
//! untouched.

use super::state::{Session, SessionError};
use crate::engine::{Engine, ExecutionFault};
use crate::model::{Regime, SessionEvent, Speed};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

/// Send the current session view to observers.
pub fn notify<E: Engine>(session: &Session<E>, events: &UnboundedSender<SessionEvent>) {
    let _ = events.send(SessionEvent::Snapshot(Box::new(session.snapshot())));
}

fn completion_message<E: Engine>(session: &Session<E>) -> String {
    format!("Finished in {:.3} s", session.elapsed().as_secs_f64())
}

fn fail<E: Engine>(session: &mut Session<E>, fault: ExecutionFault) {
    debug!(%fault, "execution fault");
    session.status = Some(fault.to_string());
    session.faulted = true;
    session.speed = Speed::IDLE;
}

fn finish<E: Engine>(session: &mut Session<E>) {
    session.speed = Speed::IDLE;
    session.status = Some(completion_message(session));
    debug!(status = ?session.status, "program finished");
}

/// Advance the engine by one instruction.
///
/// Observers are notified whatever the outcome.
pub fn step<E: Engine>(
    session: &mut Session<E>,
    events: &UnboundedSender<SessionEvent>,
) -> Result<(), SessionError> {
    session.active_engine_mut()?;
    session.status = None;
    session.faulted = false;

    let engine = session.active_engine_mut()?;
    let outcome = engine.step().map(|()| engine.reached_end());
    match outcome {
        Err(fault) => fail(session, fault),
        Ok(true) => finish(session),
        Ok(false) => trace!("step"),
    }

    notify(session, events);
    Ok(())
}

/// Cadence-driven advance. A program already at its end completes normally instead of
/// stepping past it.
pub fn scheduled_step<E: Engine>(
    session: &mut Session<E>,
    events: &UnboundedSender<SessionEvent>,
) -> Result<(), SessionError> {
    if !session.active_engine_mut()?.reached_end() {
        return step(session, events);
    }
    finish(session);
    notify(session, events);
    Ok(())
}

/// Step without yielding while the speed stays at blocking and the program has
/// instructions left. Observers see only the final state.
pub fn run_blocking<E: Engine>(
    session: &mut Session<E>,
    events: &UnboundedSender<SessionEvent>,
) -> Result<(), SessionError> {
    session.active_engine_mut()?;
    if session.speed.regime() == Regime::Blocking {
        session.status = None;
        session.faulted = false;
    }

    let mut steps = 0u64;
    while session.speed.regime() == Regime::Blocking {
        let engine = session.active_engine_mut()?;
        if engine.reached_end() {
            finish(session);
            break;
        }
        if let Err(fault) = engine.step() {
            fail(session, fault);
            break;
        }
        steps += 1;
    }

    debug!(steps, "blocking run returned");
    notify(session, events);
    Ok(())
}

/// Execute `instruction` directly, bypassing the program counter. Faults are discarded.
pub fn inject_instruction<E: Engine>(
    session: &mut Session<E>,
    instruction: char,
    events: &UnboundedSender<SessionEvent>,
) -> Result<(), SessionError> {
    let engine = session.active_engine_mut()?;
    if let Err(fault) = engine.execute(instruction) {
        trace!(%fault, ?instruction, "injected instruction failed");
    }
    notify(session, events);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RunConfig, Snapshot};
    use crate::session::test_engine::Scripted;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn started(engine: Scripted, speed: Speed) -> Session<Scripted> {
        let mut session = Session::new();
        let cfg = RunConfig {
            direct_start: false,
            ..Default::default()
        };
        session.start_with(engine, &cfg);
        session.set_speed(speed);
        session
    }

    fn snapshots(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<Snapshot> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let SessionEvent::Snapshot(s) = ev {
                out.push(*s);
            }
        }
        out
    }

    #[test]
    fn blocking_run_executes_every_instruction() {
        let (tx, mut rx) = unbounded_channel();
        let mut session = started(Scripted::new(7), Speed::BLOCKING);

        run_blocking(&mut session, &tx).unwrap();

        let engine = session.engine().unwrap();
        assert_eq!(engine.step_calls, 7);
        assert!(engine.reached_end());
        assert_eq!(session.speed(), Speed::IDLE);
        assert!(session.status().unwrap().starts_with("Finished in "));
        assert!(!session.snapshot().faulted);
        // one refresh at the end, none in between
        assert_eq!(snapshots(&mut rx).len(), 1);
    }

    #[test]
    fn blocking_run_stops_at_fault() {
        let (tx, mut rx) = unbounded_channel();
        let mut session = started(Scripted::failing_on(10, 3), Speed::BLOCKING);

        run_blocking(&mut session, &tx).unwrap();

        let engine = session.engine().unwrap();
        assert_eq!(engine.program_counter(), 2);
        assert_eq!(engine.step_calls, 3);
        assert_eq!(session.status(), Some("tape underflow"));
        assert_eq!(session.speed(), Speed::IDLE);
        assert!(session.is_active());

        let last = snapshots(&mut rx).pop().unwrap();
        assert!(last.faulted);
        assert_eq!(last.profile, Some(Vec::new()));
    }

    #[test]
    fn blocking_run_does_nothing_outside_blocking_regime() {
        let (tx, _rx) = unbounded_channel();
        let mut session = started(Scripted::new(4), Speed(50));
        session.status = Some("tape underflow".into());
        session.faulted = true;

        run_blocking(&mut session, &tx).unwrap();

        assert_eq!(session.engine().unwrap().step_calls, 0);
        assert_eq!(session.speed(), Speed(50));
        assert_eq!(session.status(), Some("tape underflow"));
        assert!(session.snapshot().faulted);
    }

    #[test]
    fn scheduled_step_at_the_end_completes_without_stepping() {
        let (tx, mut rx) = unbounded_channel();
        let mut session = started(Scripted::new(0), Speed(100));

        scheduled_step(&mut session, &tx).unwrap();

        assert_eq!(session.engine().unwrap().step_calls, 0);
        assert_eq!(session.speed(), Speed::IDLE);
        assert!(session.status().unwrap().starts_with("Finished in "));
        let snaps = snapshots(&mut rx);
        assert_eq!(snaps.len(), 1);
        assert!(!snaps[0].faulted);
    }

    #[test]
    fn scheduled_step_advances_like_a_manual_step() {
        let (tx, _rx) = unbounded_channel();
        let mut session = started(Scripted::new(3), Speed(100));

        scheduled_step(&mut session, &tx).unwrap();

        assert_eq!(session.engine().unwrap().program_counter(), 1);
        assert_eq!(session.speed(), Speed(100));
        assert_eq!(session.status(), None);
    }

    #[test]
    fn step_advances_once_and_notifies() {
        let (tx, mut rx) = unbounded_channel();
        let mut session = started(Scripted::new(3), Speed(10));

        step(&mut session, &tx).unwrap();

        assert_eq!(session.engine().unwrap().program_counter(), 1);
        assert_eq!(session.speed(), Speed(10));
        assert_eq!(session.status(), None);
        let snaps = snapshots(&mut rx);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].engine.as_ref().unwrap().program_counter, 1);
    }

    #[test]
    fn step_to_the_end_reports_completion() {
        let (tx, _rx) = unbounded_channel();
        let mut session = started(Scripted::new(2), Speed(10));

        step(&mut session, &tx).unwrap();
        step(&mut session, &tx).unwrap();

        assert_eq!(session.speed(), Speed::IDLE);
        assert!(session.status().unwrap().starts_with("Finished in "));
    }

    #[test]
    fn step_fault_halts_and_is_reported() {
        let (tx, mut rx) = unbounded_channel();
        let mut session = started(Scripted::failing_on(5, 3), Speed(100));

        for _ in 0..3 {
            step(&mut session, &tx).unwrap();
        }

        assert_eq!(session.status(), Some("tape underflow"));
        assert_eq!(session.speed(), Speed::IDLE);
        assert_eq!(session.engine().unwrap().program_counter(), 2);
        // notified after the failing step too
        assert_eq!(snapshots(&mut rx).len(), 3);
    }

    #[test]
    fn next_step_clears_previous_status() {
        let (tx, _rx) = unbounded_channel();
        let mut session = started(Scripted::failing_on(5, 1), Speed::IDLE);

        step(&mut session, &tx).unwrap();
        assert_eq!(session.status(), Some("tape underflow"));

        // manual stepping remains available after a fault
        session.engine.as_mut().unwrap().clear_fault();
        step(&mut session, &tx).unwrap();
        assert_eq!(session.status(), None);
        assert!(!session.snapshot().faulted);
        assert_eq!(session.engine().unwrap().program_counter(), 1);
    }

    #[test]
    fn stepping_without_a_session_is_an_error() {
        let (tx, mut rx) = unbounded_channel();
        let mut session: Session<Scripted> = Session::new();

        assert_eq!(step(&mut session, &tx), Err(SessionError::NoActiveSession));
        assert_eq!(
            run_blocking(&mut session, &tx),
            Err(SessionError::NoActiveSession)
        );
        assert_eq!(
            inject_instruction(&mut session, '+', &tx),
            Err(SessionError::NoActiveSession)
        );
        assert!(snapshots(&mut rx).is_empty());
    }

    #[test]
    fn injection_never_touches_speed_or_status() {
        let (tx, mut rx) = unbounded_channel();
        let mut session = started(Scripted::new(3), Speed(42));
        session.status = Some("Finished in 1.000 s".into());

        inject_instruction(&mut session, '+', &tx).unwrap();
        inject_instruction(&mut session, 'x', &tx).unwrap();

        assert_eq!(session.speed(), Speed(42));
        assert_eq!(session.status(), Some("Finished in 1.000 s"));
        assert!(session.is_active());
        let engine = session.engine().unwrap();
        assert_eq!(engine.executed, vec!['+']);
        assert_eq!(engine.program_counter(), 0);
        assert_eq!(snapshots(&mut rx).len(), 2);
    }
}
