//! OS event sources for kernel network-state notifications.
//!
//! This module provides:
//! - The opaque change token ([`OsEvent`], [`ChangeReason`])
//! - Error handling ([`SourceError`])
//! - The source abstraction ([`EventSource`])
//! - Platform-specific implementations ([`platform`])
//!
//! A source subscribes to whatever the kernel offers (netlink on Linux, the
//! routing socket on BSD/macOS, IP Helper callbacks on Windows) and turns it
//! into a stream of "something changed" tokens. Tokens carry no payload
//! beyond a reason tag; consumers re-evaluate state rather than interpreting
//! individual notifications, so dropping tokens under load is harmless.

mod error;
mod event;
pub mod platform;

pub use error::SourceError;
pub use event::{ChangeReason, OsEvent};

use tokio_stream::Stream;

/// Capacity of the token channel between the kernel reader and consumers.
///
/// Large enough to absorb a notification burst, small enough that a stalled
/// consumer never holds kernel-facing buffers hostage; overflow drops tokens.
pub const EVENT_CHANNEL_CAPACITY: usize = 8;

/// Trait for platform-specific kernel notification subscriptions.
///
/// # One-time Semantics
///
/// `into_stream` consumes `self`; the OS subscription is opened at stream
/// construction and released when the stream is dropped. A setup failure is
/// delivered as the stream's first item, after which the stream terminates.
/// Callers must treat any `Err` item as fatal for this source.
///
/// # Stream Items
///
/// - `Ok(OsEvent)` - the kernel reported a change; re-evaluate online state
/// - `Err(SourceError)` - the subscription failed; no further tokens follow
pub trait EventSource: Send {
    /// The stream type returned by `into_stream`.
    type Stream: Stream<Item = Result<OsEvent, SourceError>> + Send + Unpin;

    /// Opens the OS subscription and converts this source into a token stream.
    fn into_stream(self) -> Self::Stream;
}
