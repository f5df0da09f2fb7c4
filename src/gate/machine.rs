// src/gate/machine.rs

//! Pure gate state machine.
//!
//! No Tokio, no timers, no IO: the machine consumes readings and ticks and
//! answers with the commands the async driver should carry out.

use crate::types::ConnectivityState;

use super::schedule::RetrySchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Probing,
    WaitingOffline,
    Ready,
}

/// Work the driver should perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GateCommand {
    /// Run the connectivity probe and feed the reading to `observe`.
    Probe,
    /// Show the offline fallback surface.
    PresentFallback,
    /// Sleep this long, then call `tick`.
    Wait(std::time::Duration),
    /// Connectivity established; the gate is open.
    Proceed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateStep {
    pub state: GateState,
    pub commands: Vec<GateCommand>,
}

#[derive(Debug, Clone)]
pub struct GateMachine {
    state: GateState,
    schedule: RetrySchedule,
    latest: Option<ConnectivityState>,
}

impl GateMachine {
    pub fn new(schedule: RetrySchedule) -> Self {
        Self {
            state: GateState::Probing,
            schedule,
            latest: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Most recent reading the machine acted upon.
    pub fn latest(&self) -> Option<&ConnectivityState> {
        self.latest.as_ref()
    }

    pub fn schedule(&self) -> &RetrySchedule {
        &self.schedule
    }

    /// Start (or restart) the sequence from `Probing`.
    ///
    /// The newest reading is kept so that stale readings stay rejected
    /// across restarts.
    pub fn restart(&mut self) -> GateStep {
        self.state = GateState::Probing;
        self.schedule.reset();
        self.step(vec![GateCommand::Probe])
    }

    /// Apply a probe result.
    ///
    /// Ignored unless the machine is `Probing` and the reading is fresher
    /// than the last one acted upon.
    pub fn observe(&mut self, reading: ConnectivityState) -> GateStep {
        if self.state != GateState::Probing {
            return self.step(Vec::new());
        }
        if let Some(latest) = &self.latest {
            if !reading.supersedes(latest) {
                return self.step(Vec::new());
            }
        }
        self.latest = Some(reading);

        if reading.connectivity.is_online() {
            self.state = GateState::Ready;
            self.step(vec![GateCommand::Proceed])
        } else {
            self.state = GateState::WaitingOffline;
            let delay = self.schedule.next_delay();
            self.step(vec![GateCommand::PresentFallback, GateCommand::Wait(delay)])
        }
    }

    /// The retry timer fired.
    pub fn tick(&mut self) -> GateStep {
        if self.state != GateState::WaitingOffline {
            return self.step(Vec::new());
        }
        self.state = GateState::Probing;
        self.step(vec![GateCommand::Probe])
    }

    fn step(&self, commands: Vec<GateCommand>) -> GateStep {
        GateStep {
            state: self.state,
            commands,
        }
    }
}
