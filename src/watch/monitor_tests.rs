//! Tests for the edge detector under paused tokio time.
//!
//! Virtual-time sleeps only advance when every task is idle, so after each
//! `sleep` the watcher has fully processed whatever was sent before it.

use super::super::test_fixtures::{
    eval_error, offline, online, ChannelEventSource, MockClock, MockEvaluator,
};
use super::*;
use crate::source::{ChangeReason, OsEvent, SourceError};
use tokio::sync::mpsc::error::TryRecvError;

const JITTER: Duration = Duration::from_millis(50);

fn monitor(
    evaluator: &MockEvaluator,
    source: ChannelEventSource,
) -> OnlineMonitor<MockEvaluator, ChannelEventSource, MockClock> {
    OnlineMonitor::with_parts(evaluator.clone(), source, MockClock::at_secs(1_000))
}

async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}

fn token_of(reason: ChangeReason) -> Result<OsEvent, SourceError> {
    Ok(OsEvent::new(reason))
}

#[tokio::test(start_paused = true)]
async fn initial_event_is_emitted_first() {
    let (_tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![online("default via eth0")]);
    let clock = MockClock::at_secs(1_000);
    let (mut events, _errors) =
        OnlineMonitor::with_parts(evaluator.clone(), source, clock).watch(CancellationToken::new());

    let event = events.recv().await.unwrap();

    assert!(event.online);
    assert_eq!(event.cause, "initial: default via eth0");
    assert!(event.is_initial());
    assert_eq!(event.changed_at, clock.time());
    assert_eq!(evaluator.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_initial_evaluation_reports_error_and_best_effort_event() {
    let (_tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![Err(eval_error())]);
    let (mut events, mut errors) = monitor(&evaluator, source).watch(CancellationToken::new());

    let event = events.recv().await.unwrap();
    assert!(!event.online);
    assert_eq!(event.cause, "initial: default route check failed");

    assert!(matches!(
        errors.recv().await,
        Some(WatchError::Evaluate(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn burst_collapses_to_a_single_evaluation() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![online("default via eth0")]);
    let (mut events, _errors) = monitor(&evaluator, source).watch(CancellationToken::new());

    let _ = events.recv().await.unwrap();

    // A storm of 20 tokens well inside the debounce window.
    for _ in 0..20 {
        tx.send(token_of(ChangeReason::Address)).await.unwrap();
        settle(Duration::from_millis(10)).await;
    }
    settle(DEBOUNCE_WINDOW + JITTER).await;

    // One re-evaluation, no change, no event.
    assert_eq!(evaluator.calls(), 2);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn lost_carrier_emits_offline_edge_with_combined_cause() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![
        online("default via eth0"),
        offline("default iface down"),
    ]);
    let (mut events, _errors) = monitor(&evaluator, source).watch(CancellationToken::new());

    let _ = events.recv().await.unwrap();

    tx.send(token_of(ChangeReason::Link)).await.unwrap();
    settle(DEBOUNCE_WINDOW + JITTER).await;

    let event = events.recv().await.unwrap();
    assert!(!event.online);
    assert_eq!(event.cause, "link change; default iface down");
}

#[tokio::test(start_paused = true)]
async fn flap_within_debounce_is_suppressed() {
    let (tx, source) = ChannelEventSource::new();
    // The route vanishes and returns inside the window; by the time the
    // timer fires the verdict matches `last` again.
    let evaluator =
        MockEvaluator::scripted(vec![online("default via eth0"), online("default via eth0")]);
    let (mut events, _errors) = monitor(&evaluator, source).watch(CancellationToken::new());

    let _ = events.recv().await.unwrap();

    tx.send(token_of(ChangeReason::Route)).await.unwrap();
    settle(Duration::from_millis(300)).await;
    tx.send(token_of(ChangeReason::Route)).await.unwrap();
    settle(DEBOUNCE_WINDOW + JITTER).await;

    assert_eq!(evaluator.calls(), 2);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn debounce_is_trailing_edge() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![
        online("default via eth0"),
        offline("no default route"),
    ]);
    let (mut events, _errors) = monitor(&evaluator, source).watch(CancellationToken::new());

    let _ = events.recv().await.unwrap();

    tx.send(token_of(ChangeReason::Route)).await.unwrap();
    settle(Duration::from_millis(500)).await;
    assert_eq!(evaluator.calls(), 1, "timer fired before quiet period");

    // A second token re-arms the timer.
    tx.send(token_of(ChangeReason::Address)).await.unwrap();
    settle(Duration::from_millis(500)).await;
    assert_eq!(evaluator.calls(), 1, "timer was not re-armed");

    settle(Duration::from_millis(300)).await;
    assert_eq!(evaluator.calls(), 2);

    // The cause reflects the most recent token's reason.
    let event = events.recv().await.unwrap();
    assert_eq!(event.cause, "addr change; no default route");
}

#[tokio::test(start_paused = true)]
async fn repeated_identical_tokens_behave_like_one() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![
        online("default via eth0"),
        offline("no default route"),
    ]);
    let (mut events, _errors) = monitor(&evaluator, source).watch(CancellationToken::new());

    let _ = events.recv().await.unwrap();

    for _ in 0..5 {
        tx.send(token_of(ChangeReason::Route)).await.unwrap();
    }
    settle(DEBOUNCE_WINDOW + JITTER).await;

    assert_eq!(evaluator.calls(), 2);
    let event = events.recv().await.unwrap();
    assert_eq!(event.cause, "route change; no default route");
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn consecutive_events_alternate_online_state() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![
        offline("no default route"),
        online("default via eth0"),
        offline("no default route"),
    ]);
    let (mut events, _errors) = monitor(&evaluator, source).watch(CancellationToken::new());

    let mut seen = vec![events.recv().await.unwrap().online];

    for _ in 0..2 {
        tx.send(token_of(ChangeReason::Route)).await.unwrap();
        settle(DEBOUNCE_WINDOW + JITTER).await;
        seen.push(events.recv().await.unwrap().online);
    }

    assert_eq!(seen, vec![false, true, false]);
}

#[tokio::test(start_paused = true)]
async fn source_errors_are_rebroadcast_without_blocking_events() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![
        online("default via eth0"),
        offline("no default route"),
    ]);
    let (mut events, mut errors) = monitor(&evaluator, source).watch(CancellationToken::new());

    let _ = events.recv().await.unwrap();

    tx.send(Err(SourceError::Stopped)).await.unwrap();
    assert!(matches!(errors.recv().await, Some(WatchError::Source(_))));

    // The event path still works after a source error item.
    tx.send(token_of(ChangeReason::Route)).await.unwrap();
    settle(DEBOUNCE_WINDOW + JITTER).await;
    assert!(!events.recv().await.unwrap().online);
}

#[tokio::test(start_paused = true)]
async fn evaluation_error_after_quiet_period_emits_no_event() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![online("default via eth0"), Err(eval_error())]);
    let (mut events, mut errors) = monitor(&evaluator, source).watch(CancellationToken::new());

    let _ = events.recv().await.unwrap();

    tx.send(token_of(ChangeReason::Route)).await.unwrap();
    settle(DEBOUNCE_WINDOW + JITTER).await;

    assert!(matches!(
        errors.recv().await,
        Some(WatchError::Evaluate(_))
    ));
    assert_eq!(evaluator.calls(), 2);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn cancellation_closes_both_streams() {
    let (_tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![online("default via eth0")]);
    let token = CancellationToken::new();
    let (mut events, mut errors) = monitor(&evaluator, source).watch(token.clone());

    let _ = events.recv().await.unwrap();

    token.cancel();

    assert!(events.recv().await.is_none());
    assert!(errors.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_pending_timer() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![
        online("default via eth0"),
        offline("no default route"),
    ]);
    let token = CancellationToken::new();
    let (mut events, _errors) = monitor(&evaluator, source).watch(token.clone());

    let _ = events.recv().await.unwrap();

    tx.send(token_of(ChangeReason::Route)).await.unwrap();
    settle(Duration::from_millis(100)).await;
    token.cancel();
    settle(DEBOUNCE_WINDOW * 2).await;

    // The armed timer never fired.
    assert_eq!(evaluator.calls(), 1);
    assert!(events.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn source_closure_leaves_the_watcher_running() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![online("default via eth0")]);
    let token = CancellationToken::new();
    let (mut events, _errors) = monitor(&evaluator, source).watch(token.clone());

    let _ = events.recv().await.unwrap();

    drop(tx);
    settle(DEBOUNCE_WINDOW).await;

    // No tokens can arrive anymore, but the stream is still open.
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    token.cancel();
    assert!(events.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn custom_debounce_window_is_respected() {
    let (tx, source) = ChannelEventSource::new();
    let evaluator = MockEvaluator::scripted(vec![
        online("default via eth0"),
        offline("no default route"),
    ]);
    let (mut events, _errors) = monitor(&evaluator, source)
        .with_debounce(Duration::from_millis(100))
        .watch(CancellationToken::new());

    let _ = events.recv().await.unwrap();

    tx.send(token_of(ChangeReason::Route)).await.unwrap();
    settle(Duration::from_millis(150)).await;

    assert_eq!(evaluator.calls(), 2);
    assert!(!events.recv().await.unwrap().online);
}
