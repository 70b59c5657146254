//! Wake detection from monotonic-clock discontinuities.
//!
//! While the OS is suspended the sampling task does not run, so the first
//! tick after resume arrives late by roughly the whole sleep. A gap much
//! larger than the sample period is therefore a portable, permission-free
//! suspend signal with no platform power-management API involved. Consumers
//! treat a signal as an invitation to re-evaluate: kernel event streams can
//! miss edges across a suspend.
//!
//! The monotonic clock used here ([`std::time::Instant`]) does not advance
//! during suspend on any supported platform, which is exactly the property
//! the detector relies on.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default sampling period.
pub const DEFAULT_SAMPLE: Duration = Duration::from_secs(1);

/// Default extra gap, beyond one sample period, that classifies as a wake.
pub const DEFAULT_GAP_THRESHOLD: Duration = Duration::from_millis(1500);

/// Pure gap detector: feed it tick observations, it reports wakes.
#[derive(Debug)]
pub struct WakeDetector {
    last_tick: Instant,
    sample: Duration,
    gap_threshold: Duration,
}

impl WakeDetector {
    /// Creates a detector anchored at `start`. Zero durations fall back to
    /// the defaults.
    #[must_use]
    pub fn new(start: Instant, sample: Duration, gap_threshold: Duration) -> Self {
        Self {
            last_tick: start,
            sample: if sample.is_zero() {
                DEFAULT_SAMPLE
            } else {
                sample
            },
            gap_threshold: if gap_threshold.is_zero() {
                DEFAULT_GAP_THRESHOLD
            } else {
                gap_threshold
            },
        }
    }

    /// Sample period after normalization.
    #[must_use]
    pub const fn sample(&self) -> Duration {
        self.sample
    }

    /// Records a tick; true if the gap since the previous tick says the
    /// host slept in between. `last_tick` always advances, so one suspend
    /// yields exactly one signal however large the gap was.
    pub fn observe(&mut self, now: Instant) -> bool {
        let gap = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        gap >= self.sample + self.gap_threshold
    }
}

/// Starts the wake watcher; returns its signal stream.
///
/// One `()` arrives per detected suspend/resume. Signals are sent
/// non-blocking and dropped if the receiver is behind; wakes are a hint to
/// re-evaluate, not a ledger. Zero durations select the defaults
/// ([`DEFAULT_SAMPLE`], [`DEFAULT_GAP_THRESHOLD`]). Cancelling `token`
/// closes the stream.
///
/// No ordering is promised between this stream and the change-event stream;
/// consumers multiplex them.
///
/// Must be called from within a tokio runtime.
pub fn start_wake_watcher(
    token: CancellationToken,
    sample: Duration,
    gap_threshold: Duration,
) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    let mut detector = WakeDetector::new(Instant::now(), sample, gap_threshold);

    tokio::spawn(async move {
        let mut ticker = interval(detector.sample());
        // A resume makes the next tick overdue once; piling up the missed
        // ones would double-count the gap.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so observations
        // start one period out.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                () = token.cancelled() => break,

                _ = ticker.tick() => {
                    if detector.observe(Instant::now()) {
                        tracing::debug!("monotonic gap observed, host likely resumed from sleep");
                        let _ = tx.try_send(());
                    }
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: Duration = Duration::from_secs(1);
    const GAP: Duration = Duration::from_millis(1500);

    #[test]
    fn six_second_jump_yields_exactly_one_signal() {
        let base = Instant::now();
        let mut detector = WakeDetector::new(base, SAMPLE, GAP);

        assert!(!detector.observe(base + Duration::from_secs(1)));
        assert!(detector.observe(base + Duration::from_secs(7)));
        // The next regular tick is quiet again.
        assert!(!detector.observe(base + Duration::from_secs(8)));
    }

    #[test]
    fn gap_exactly_at_threshold_fires() {
        let base = Instant::now();
        let mut detector = WakeDetector::new(base, SAMPLE, GAP);

        assert!(detector.observe(base + Duration::from_millis(2500)));
    }

    #[test]
    fn gap_just_below_threshold_does_not_fire() {
        let base = Instant::now();
        let mut detector = WakeDetector::new(base, SAMPLE, GAP);

        assert!(!detector.observe(base + Duration::from_millis(2499)));
    }

    #[test]
    fn regular_ticks_never_fire() {
        let base = Instant::now();
        let mut detector = WakeDetector::new(base, SAMPLE, GAP);

        for i in 1..=10 {
            assert!(!detector.observe(base + Duration::from_secs(i)));
        }
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let base = Instant::now();
        let mut detector = WakeDetector::new(base, Duration::ZERO, Duration::ZERO);

        assert_eq!(detector.sample(), DEFAULT_SAMPLE);
        assert!(!detector.observe(base + Duration::from_secs(2)));
        assert!(detector.observe(base + Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_closes_the_signal_stream() {
        let token = CancellationToken::new();
        let mut signals = start_wake_watcher(token.clone(), SAMPLE, GAP);

        token.cancel();

        assert!(signals.recv().await.is_none());
    }
}
