// tests/retry_gate.rs
//
// Drives RetryGate with a scripted probe on paused Tokio time, so retry
// delays are exact and the tests take no wall-clock time.

use std::error::Error;
use std::time::Duration;

use tokio::time::Instant;

use launchgate::gate::{GateState, RetryGate, RetrySchedule};
use launchgate::shell::FallbackNotice;
use launchgate::types::Connectivity::{Offline, Online};
use launchgate_test_utils::{Presentation, RecordingPresenter, ScriptedProbe, init_tracing};

type TestResult = Result<(), Box<dyn Error>>;

/// Two offline readings, then online: fallback twice, primary path after
/// exactly two retry intervals.
#[tokio::test(start_paused = true)]
async fn offline_twice_then_online_takes_two_intervals() -> TestResult {
    init_tracing();
    let probe = ScriptedProbe::new([Offline, Offline, Online]);
    let presenter = RecordingPresenter::new();
    let mut gate = RetryGate::new(RetrySchedule::fixed(Duration::from_secs(10)));

    let started = Instant::now();
    let reading = gate.run(&probe, &presenter).await;

    assert_eq!(started.elapsed(), Duration::from_secs(20));
    assert_eq!(reading.connectivity, Online);
    assert_eq!(reading.seq, 3);
    assert_eq!(probe.calls(), 3);
    assert_eq!(gate.state(), GateState::Ready);
    assert_eq!(
        presenter.calls(),
        vec![
            Presentation::Fallback(FallbackNotice::Offline),
            Presentation::Fallback(FallbackNotice::Offline),
        ]
    );

    // Fallbacks are shown right after each failed probe, not after the wait.
    let times: Vec<_> = presenter.timed_calls().into_iter().map(|(t, _)| t - started).collect();
    assert_eq!(times, vec![Duration::ZERO, Duration::from_secs(10)]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn online_on_first_probe_never_shows_fallback() -> TestResult {
    init_tracing();
    let probe = ScriptedProbe::online();
    let presenter = RecordingPresenter::new();
    let mut gate = RetryGate::new(RetrySchedule::default());

    let started = Instant::now();
    gate.run(&probe, &presenter).await;

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(probe.calls(), 1);
    assert!(presenter.calls().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn backoff_schedule_grows_and_caps() -> TestResult {
    init_tracing();
    let probe = ScriptedProbe::new([Offline, Offline, Offline, Online]);
    let presenter = RecordingPresenter::new();
    let schedule =
        RetrySchedule::with_backoff(Duration::from_secs(1), Duration::from_secs(3), 2.0);
    let mut gate = RetryGate::new(schedule);

    let started = Instant::now();
    gate.run(&probe, &presenter).await;

    // 1s + 2s + 3s (capped from 4s).
    assert_eq!(started.elapsed(), Duration::from_secs(6));
    assert_eq!(presenter.fallback_count(), 3);
    Ok(())
}

/// A second run starts over: the probe is consulted again and the
/// schedule is reset.
#[tokio::test(start_paused = true)]
async fn rerunning_the_gate_probes_afresh() -> TestResult {
    init_tracing();
    let probe = ScriptedProbe::new([Offline, Online, Offline, Online]);
    let presenter = RecordingPresenter::new();
    let schedule =
        RetrySchedule::with_backoff(Duration::from_secs(2), Duration::from_secs(60), 2.0);
    let mut gate = RetryGate::new(schedule);

    let first = gate.run(&probe, &presenter).await;

    let started = Instant::now();
    let second = gate.run(&probe, &presenter).await;

    assert!(second.supersedes(&first));
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(probe.calls(), 4);
    Ok(())
}

/// Dropping the gate future mid-wait leaves nothing pending.
#[tokio::test(start_paused = true)]
async fn cancelling_mid_wait_is_clean() -> TestResult {
    init_tracing();
    let probe = ScriptedProbe::new([Offline]);
    let presenter = RecordingPresenter::new();
    let mut gate = RetryGate::new(RetrySchedule::fixed(Duration::from_secs(10)));

    let cancelled = tokio::time::timeout(Duration::from_secs(25), gate.run(&probe, &presenter)).await;

    assert!(cancelled.is_err(), "gate must keep waiting while offline");
    assert_eq!(probe.calls(), 3);
    assert_eq!(presenter.fallback_count(), 3);
    Ok(())
}
