//! Shared channel-backed stream for thread-based kernel readers.
//!
//! The Linux and BSD sources both run a dedicated reader thread that blocks
//! in a kernel `recv` and forwards tokens over a bounded channel. This module
//! provides the consumer half: a [`Stream`] wrapping the channel receiver
//! plus a stop flag that tells the reader thread to unwind when the stream
//! is dropped.

use crate::source::{OsEvent, SourceError};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// Shared stop flag between a reader thread and its stream.
///
/// The thread polls the flag between kernel reads (reads carry a short
/// receive timeout, so a set flag is observed within one timeout period).
#[derive(Debug, Clone, Default)]
pub(crate) struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Stream of change tokens produced by a kernel reader thread.
///
/// Dropping the stream raises the stop flag; the reader thread closes its
/// socket and exits within one receive-timeout period. The socket is owned
/// by the thread and released before the channel closes.
#[derive(Debug)]
pub struct ReaderStream {
    receiver: mpsc::Receiver<Result<OsEvent, SourceError>>,
    stop: StopFlag,
    /// Whether a fatal error has been yielded.
    terminated: bool,
}

impl ReaderStream {
    pub(crate) fn new(receiver: mpsc::Receiver<Result<OsEvent, SourceError>>, stop: StopFlag) -> Self {
        Self {
            receiver,
            stop,
            terminated: false,
        }
    }
}

impl Stream for ReaderStream {
    type Item = Result<OsEvent, SourceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }

        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(Ok(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Some(Err(e))) => {
                self.terminated = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                // Reader thread exited without reporting a fatal error.
                self.terminated = true;
                if self.stop.is_raised() {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Err(SourceError::Stopped)))
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ReaderStream {
    fn drop(&mut self) {
        self.stop.raise();
    }
}
