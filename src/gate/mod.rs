// src/gate/mod.rs

//! Connectivity gate.
//!
//! Holds the shell back until the probe reports `Online`, presenting the
//! fallback surface and re-probing on a timer in between. There is no
//! attempt cap: the only way out of the loop is an `Online` reading (or the
//! caller dropping the future).
//!
//! The transitions live in [`machine`]; [`RetryGate`] is the async driver.

pub mod machine;
pub mod schedule;

use std::collections::VecDeque;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::probe::ConnectivityProbe;
use crate::shell::{FallbackNotice, ShellPresenter};
use crate::types::ConnectivityState;

pub use machine::{GateCommand, GateMachine, GateState, GateStep};
pub use schedule::RetrySchedule;

#[derive(Debug)]
pub struct RetryGate {
    machine: GateMachine,
    next_seq: u64,
}

impl RetryGate {
    pub fn new(schedule: RetrySchedule) -> Self {
        Self {
            machine: GateMachine::new(schedule),
            next_seq: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.machine.state()
    }

    /// Run the gate from `Probing` until it reaches `Ready`.
    ///
    /// Cancel-safe at every suspension point; exactly one timer is pending
    /// at a time.
    pub async fn run(
        &mut self,
        probe: &dyn ConnectivityProbe,
        presenter: &dyn ShellPresenter,
    ) -> ConnectivityState {
        let mut pending: VecDeque<GateCommand> = self.machine.restart().commands.into();

        loop {
            let Some(command) = pending.pop_front() else {
                warn!(state = ?self.machine.state(), "gate produced no work; restarting probe");
                pending.extend(self.machine.restart().commands);
                continue;
            };

            let step = match command {
                GateCommand::Probe => {
                    self.next_seq += 1;
                    let reading = ConnectivityState::new(probe.check().await, self.next_seq);
                    debug!(
                        seq = reading.seq,
                        connectivity = ?reading.connectivity,
                        "connectivity probe finished"
                    );
                    self.machine.observe(reading)
                }
                GateCommand::PresentFallback => {
                    presenter.present_fallback(&FallbackNotice::Offline);
                    continue;
                }
                GateCommand::Wait(delay) => {
                    info!(
                        attempt = self.machine.schedule().attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "offline; retrying connectivity check"
                    );
                    sleep(delay).await;
                    self.machine.tick()
                }
                GateCommand::Proceed => {
                    if let Some(reading) = self.machine.latest() {
                        info!(seq = reading.seq, "connectivity established");
                        return *reading;
                    }
                    pending.extend(self.machine.restart().commands);
                    continue;
                }
            };

            pending.extend(step.commands);
        }
    }
}
