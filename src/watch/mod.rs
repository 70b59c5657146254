//! Debounced online-state change stream.
//!
//! This module provides:
//! - The change event type ([`OnlineEvent`])
//! - Error handling ([`WatchError`])
//! - The edge detector / debouncer ([`OnlineMonitor`])
//! - The [`watch`] convenience function wiring platform defaults
//!
//! The watcher turns a storm of kernel notifications into at most one change
//! event per quiet period: every token re-arms a trailing-edge debounce
//! timer, whose expiry triggers a single re-evaluation. An event is emitted
//! only when the online verdict actually flipped.

mod error;
mod event;
mod monitor;
#[cfg(test)]
mod test_fixtures;

pub use error::WatchError;
pub use event::OnlineEvent;
pub use monitor::{OnlineMonitor, DEBOUNCE_WINDOW};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Starts watching online-state transitions with this platform's evaluator
/// and event source.
///
/// Returns the change stream and the error stream. The change stream always
/// begins with one `"initial: "` event carrying the state at startup; after
/// that, consecutive events alternate between online and offline. Errors
/// flow on their own channel and never block change delivery. Cancelling
/// `token` closes both streams in bounded time.
///
/// Must be called from within a tokio runtime.
///
/// # Example
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let token = CancellationToken::new();
/// let (mut events, mut errors) = netup::watch(token.clone());
///
/// loop {
///     tokio::select! {
///         Some(event) = events.recv() => {
///             println!("online={} cause={}", event.online, event.cause);
///         }
///         Some(e) = errors.recv() => {
///             eprintln!("watch error: {e}");
///         }
///         else => break,
///     }
/// }
/// # }
/// ```
pub fn watch(
    token: CancellationToken,
) -> (mpsc::Receiver<OnlineEvent>, mpsc::Receiver<WatchError>) {
    OnlineMonitor::new().watch(token)
}
