//! Session lifecycle and execution driving.
//!
//! `state` owns the session (engine, speed, timing, status line), `driver` advances the
//! engine one step, in a blocking burst, or by injected instruction, and `controller` runs
//! the command loop that schedules automatic stepping. UI and CLI layers only talk to the
//! controller.

mod controller;
mod driver;
mod state;
#[cfg(test)]
mod test_engine;

pub(crate) use controller::{run_controller, UiCommand};
