use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use launchgate::probe::ConnectivityProbe;
use launchgate::shell::{FallbackNotice, ShellPresenter};
use launchgate::supervisor::BackendControl;
use launchgate::types::{Connectivity, HandleId, SupervisionOutcome};
use tokio::time::Instant;

/// A probe that replays a fixed sequence of readings, then keeps repeating
/// the last one.
#[derive(Debug)]
pub struct ScriptedProbe {
    readings: Mutex<VecDeque<Connectivity>>,
    last: Mutex<Connectivity>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(readings: impl IntoIterator<Item = Connectivity>) -> Self {
        Self {
            readings: Mutex::new(readings.into_iter().collect()),
            last: Mutex::new(Connectivity::Online),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn online() -> Self {
        Self::new([Connectivity::Online])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConnectivityProbe for ScriptedProbe {
    fn check(&self) -> Pin<Box<dyn Future<Output = Connectivity> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.readings.lock().unwrap().pop_front();
        let reading = {
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = next;
            }
            *last
        };
        Box::pin(async move { reading })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    Primary,
    Fallback(FallbackNotice),
}

/// Records every surface request together with the (Tokio) time it
/// happened.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<(Instant, Presentation)>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Presentation> {
        self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Presentation)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Presentation> {
        self.calls.lock().unwrap().last().map(|(_, p)| p.clone())
    }

    pub fn primary_count(&self) -> usize {
        self.calls().iter().filter(|p| **p == Presentation::Primary).count()
    }

    pub fn fallback_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|p| matches!(p, Presentation::Fallback(_)))
            .count()
    }

    fn record(&self, presentation: Presentation) {
        self.calls.lock().unwrap().push((Instant::now(), presentation));
    }
}

impl ShellPresenter for RecordingPresenter {
    fn present_primary(&self) {
        self.record(Presentation::Primary);
    }

    fn present_fallback(&self, notice: &FallbackNotice) {
        self.record(Presentation::Fallback(notice.clone()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Start,
    Stop,
}

/// Observable side of a [`FakeBackend`], shared with the test.
#[derive(Debug, Default)]
pub struct FakeBackendState {
    calls: Mutex<Vec<BackendCall>>,
    live: AtomicBool,
}

impl FakeBackendState {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.calls().iter().filter(|c| **c == BackendCall::Start).count()
    }

    /// True between a `start` call and the next `stop`, i.e. while a real
    /// backend would have a process in the OS table.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// A `BackendControl` that never creates processes.
///
/// Each `start` waits `start_delay`, then returns the next scripted outcome
/// or, once the script is exhausted, `Started` with a fresh handle id
/// (1, 2, 3, ...).
#[derive(Debug)]
pub struct FakeBackend {
    state: Arc<FakeBackendState>,
    outcomes: VecDeque<SupervisionOutcome>,
    start_delay: Duration,
    current: Option<HandleId>,
    next_id: u64,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(FakeBackendState::default()),
            outcomes: VecDeque::new(),
            start_delay: Duration::ZERO,
            current: None,
            next_id: 1,
        }
    }

    pub fn with_outcomes(mut self, outcomes: impl IntoIterator<Item = SupervisionOutcome>) -> Self {
        self.outcomes = outcomes.into_iter().collect();
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn state(&self) -> Arc<FakeBackendState> {
        Arc::clone(&self.state)
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendControl for FakeBackend {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = SupervisionOutcome> + Send + '_>> {
        Box::pin(async move {
            self.state.calls.lock().unwrap().push(BackendCall::Start);
            self.state.live.store(true, Ordering::SeqCst);

            if !self.start_delay.is_zero() {
                tokio::time::sleep(self.start_delay).await;
            }

            let outcome = match self.outcomes.pop_front() {
                Some(outcome) => outcome,
                None => {
                    let handle = HandleId(self.next_id);
                    self.next_id += 1;
                    SupervisionOutcome::Started {
                        handle,
                        pid: 10_000 + handle.0 as u32,
                    }
                }
            };

            match &outcome {
                SupervisionOutcome::Started { handle, .. } => self.current = Some(*handle),
                _ => self.state.live.store(false, Ordering::SeqCst),
            }
            outcome
        })
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.state.calls.lock().unwrap().push(BackendCall::Stop);
            self.state.live.store(false, Ordering::SeqCst);
            self.current = None;
        })
    }

    fn current_handle(&self) -> Option<HandleId> {
        self.current
    }
}
