//! Edge detection with trailing-edge debouncing over OS change tokens.

use crate::online::platform::PlatformEvaluator;
use crate::online::{OnlineEvaluator, OnlineSnapshot};
use crate::source::platform::PlatformEventSource;
use crate::source::{ChangeReason, EventSource};
use crate::time::{Clock, SystemClock};
use crate::watch::{OnlineEvent, WatchError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Quiet period required after the last kernel token before re-evaluating.
///
/// Long enough to let DHCP/route churn settle, short enough that consumers
/// see a transition well under a second after the network stabilizes.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(750);

/// Change-event channel capacity. The consumer is expected to drain;
/// blocking the watcher on a full change channel is acceptable.
const CHANGE_CHANNEL_CAPACITY: usize = 1;

/// Error channel capacity. Errors are sent non-blocking and dropped on
/// overflow; error storms are not interesting after the first.
const ERROR_CHANNEL_CAPACITY: usize = 1;

/// Debounced online-state edge detector.
///
/// Consumes kernel change tokens from an [`EventSource`], collapses bursts
/// with a trailing-edge debounce, re-evaluates via an [`OnlineEvaluator`],
/// and emits an [`OnlineEvent`] only when the verdict flipped.
///
/// # Type Parameters
///
/// * `E` - The evaluator computing the online verdict
/// * `S` - The kernel event source
/// * `C` - The wall clock stamping emitted events (defaults to [`SystemClock`])
///
/// Tests inject mock evaluators, channel-backed sources and fixed clocks
/// through [`OnlineMonitor::with_parts`]; production goes through
/// [`OnlineMonitor::new`] or the crate-level [`watch`] function.
///
/// [`watch`]: crate::watch()
#[derive(Debug)]
pub struct OnlineMonitor<E, S, C = SystemClock> {
    evaluator: E,
    source: S,
    clock: C,
    debounce: Duration,
}

impl OnlineMonitor<PlatformEvaluator, PlatformEventSource, SystemClock> {
    /// Creates a monitor wired to this platform's evaluator and event source.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(
            PlatformEvaluator::default(),
            PlatformEventSource::default(),
            SystemClock,
        )
    }
}

impl Default for OnlineMonitor<PlatformEvaluator, PlatformEventSource, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, S, C> OnlineMonitor<E, S, C>
where
    E: OnlineEvaluator + 'static,
    S: EventSource + 'static,
    C: Clock + 'static,
{
    /// Creates a monitor from explicit parts.
    #[must_use]
    pub fn with_parts(evaluator: E, source: S, clock: C) -> Self {
        Self {
            evaluator,
            source,
            clock,
            debounce: DEBOUNCE_WINDOW,
        }
    }

    /// Overrides the debounce window.
    #[must_use]
    pub const fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Returns the configured debounce window.
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Starts watching; returns the change stream and the error stream.
    ///
    /// The change stream begins with exactly one `"initial: "` event; after
    /// that, consecutive events always differ in `online`. If the initial
    /// evaluation fails, the error is published first and the initial event
    /// still carries the best-effort (offline) verdict. Cancelling `token`
    /// stops the pending debounce timer and closes both streams; nothing is
    /// emitted after that.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch(
        self,
        token: CancellationToken,
    ) -> (mpsc::Receiver<OnlineEvent>, mpsc::Receiver<WatchError>) {
        let (event_tx, event_rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        tokio::spawn(watch_loop(self, token, event_tx, error_tx));

        (event_rx, error_rx)
    }
}

/// The watcher task: initial event, then {cancellation, token, timer}
/// multiplexing until cancelled.
async fn watch_loop<E, S, C>(
    monitor: OnlineMonitor<E, S, C>,
    token: CancellationToken,
    event_tx: mpsc::Sender<OnlineEvent>,
    error_tx: mpsc::Sender<WatchError>,
) where
    E: OnlineEvaluator + 'static,
    S: EventSource + 'static,
    C: Clock + 'static,
{
    let OnlineMonitor {
        evaluator,
        source,
        clock,
        debounce,
    } = monitor;

    let mut events = source.into_stream();

    let initial = snapshot_or_report(&evaluator, &error_tx);
    let mut last = initial.online;
    let event = OnlineEvent::new(
        initial.online,
        clock.now(),
        format!("initial: {}", initial.cause),
    );
    if event_tx.send(event).await.is_err() {
        // Consumer gone before the first event.
        return;
    }

    let timer = sleep(debounce);
    tokio::pin!(timer);
    let mut armed = false;
    let mut source_done = false;
    let mut last_reason: Option<ChangeReason> = None;

    loop {
        tokio::select! {
            biased;

            () = token.cancelled() => break,

            maybe = events.next(), if !source_done => match maybe {
                Some(Ok(event)) => {
                    tracing::debug!(reason = %event.reason, "kernel change token, debouncing");
                    last_reason = Some(event.reason);
                    // Trailing-edge debounce: every token re-arms the timer.
                    timer.as_mut().reset(Instant::now() + debounce);
                    armed = true;
                }
                Some(Err(e)) => {
                    tracing::warn!("event source error: {e}");
                    let _ = error_tx.try_send(WatchError::Source(e));
                }
                None => {
                    // Fatal source failure was already surfaced; keep
                    // serving the pending timer and cancellation.
                    source_done = true;
                }
            },

            () = timer.as_mut(), if armed => {
                armed = false;
                let snapshot = match evaluator.evaluate() {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        let _ = error_tx.try_send(WatchError::Evaluate(e));
                        continue;
                    }
                };
                if snapshot.online == last {
                    tracing::debug!(online = last, "state unchanged after quiet period");
                    continue;
                }
                last = snapshot.online;
                let cause = match last_reason {
                    Some(reason) => format!("{}; {}", reason.label(), snapshot.cause),
                    None => snapshot.cause,
                };
                tracing::debug!(online = snapshot.online, %cause, "online state changed");
                let event = OnlineEvent::new(snapshot.online, clock.now(), cause);
                if event_tx.send(event).await.is_err() {
                    // Consumer gone.
                    break;
                }
            }
        }
    }
    // event_tx and error_tx drop here, closing both streams.
}

/// Evaluates once; a failure is reported and mapped to the best-effort
/// offline snapshot.
fn snapshot_or_report<E: OnlineEvaluator>(
    evaluator: &E,
    error_tx: &mpsc::Sender<WatchError>,
) -> OnlineSnapshot {
    match evaluator.evaluate() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            let cause = e.failure_cause();
            let _ = error_tx.try_send(WatchError::Evaluate(e));
            OnlineSnapshot::offline(cause)
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
