//! macOS / FreeBSD event source using a `PF_ROUTE` routing socket.
//!
//! The routing socket delivers a copy of every routing-table and interface
//! message. Classifying them is deliberately skipped: the fact that the
//! kernel sent *something* is what matters, so every successful read emits
//! one `"net change"` token and a record the parser would not recognize is
//! not an error.

use super::reader::{ReaderStream, StopFlag};
use crate::source::{ChangeReason, EventSource, OsEvent, SourceError, EVENT_CHANNEL_CAPACITY};
use nix::errno::Errno;
use nix::sys::socket::{recv, setsockopt, socket, sockopt, AddressFamily, MsgFlags, SockFlag, SockType};
use nix::sys::time::{TimeVal, TimeValLike};
use std::os::fd::{AsRawFd, OwnedFd};
use tokio::sync::mpsc;

/// Kernel read buffer, comfortably larger than any routing message.
const READ_BUFFER_LEN: usize = 64 * 1024;

/// Upper bound on how long a stop request can go unobserved.
const READ_TIMEOUT_MS: i64 = 500;

/// BSD implementation of [`EventSource`] backed by the routing socket.
///
/// The socket is opened when [`EventSource::into_stream`] is called and
/// owned by the reader thread; dropping the returned stream releases it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsdEventSource {
    _private: (),
}

impl BsdEventSource {
    /// Creates a new routing-socket event source.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl EventSource for BsdEventSource {
    type Stream = ReaderStream;

    fn into_stream(self) -> Self::Stream {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stop = StopFlag::new();
        let thread_stop = stop.clone();

        std::thread::spawn(move || {
            let fd = match open_route_socket() {
                Ok(fd) => fd,
                Err(e) => {
                    let _ = tx.try_send(Err(e));
                    return;
                }
            };
            run_reader(&fd, &tx, &thread_stop);
            // fd drops here, before tx: the socket closes before the
            // channel does.
        });

        ReaderStream::new(rx, stop)
    }
}

/// Opens the raw routing socket, any address family.
///
/// # Coverage Note
///
/// Excluded from coverage: requires a live kernel routing socket.
#[cfg(not(tarpaulin_include))]
fn open_route_socket() -> Result<OwnedFd, SourceError> {
    let fd = socket(AddressFamily::Route, SockType::Raw, SockFlag::empty(), None)
        .map_err(|e| SourceError::Setup(e.into()))?;

    // Bounded blocking so the reader can observe its stop flag.
    setsockopt(
        &fd,
        sockopt::ReceiveTimeout,
        &TimeVal::milliseconds(READ_TIMEOUT_MS),
    )
    .map_err(|e| SourceError::Setup(e.into()))?;

    Ok(fd)
}

/// Reader-thread loop: every successful read is one token.
///
/// # Coverage Note
///
/// Excluded from coverage: requires live kernel notifications.
#[cfg(not(tarpaulin_include))]
fn run_reader(fd: &OwnedFd, tx: &mpsc::Sender<Result<OsEvent, SourceError>>, stop: &StopFlag) {
    let mut buf = vec![0u8; READ_BUFFER_LEN];
    loop {
        if stop.is_raised() {
            return;
        }
        match recv(fd.as_raw_fd(), &mut buf, MsgFlags::empty()) {
            Ok(n) => {
                tracing::trace!(bytes = n, "routing socket message");
                if tx.try_send(Ok(OsEvent::new(ChangeReason::Net))).is_err() && tx.is_closed() {
                    // Consumer gone; full-channel drops are harmless.
                    return;
                }
            }
            // Interrupted or timed out: recheck the stop flag and keep reading.
            Err(Errno::EINTR | Errno::EAGAIN) => {}
            Err(e) => {
                let _ = tx.try_send(Err(SourceError::Read(e.into())));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration test: PF_ROUTE needs no privileges on macOS/FreeBSD.
    #[test]
    fn route_socket_opens() {
        let fd = open_route_socket();
        assert!(fd.is_ok(), "routing socket setup failed: {:?}", fd.err());
    }
}
