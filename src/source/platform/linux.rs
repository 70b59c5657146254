//! Linux event source using a `NETLINK_ROUTE` socket.
//!
//! Subscribes to the rtnetlink multicast groups covering link state, IPv4/v6
//! addresses and IPv4/v6 routes. A dedicated reader thread blocks in `recv`
//! (with a short timeout so cancellation is observed promptly), decodes the
//! multiplexed message stream and forwards one token per classifiable
//! message.

use super::reader::{ReaderStream, StopFlag};
use crate::source::{ChangeReason, EventSource, OsEvent, SourceError, EVENT_CHANNEL_CAPACITY};
use nix::errno::Errno;
use nix::sys::socket::{
    bind, recv, setsockopt, socket, sockopt, AddressFamily, MsgFlags, NetlinkAddr, SockFlag,
    SockProtocol, SockType,
};
use nix::sys::time::{TimeVal, TimeValLike};
use std::os::fd::{AsRawFd, OwnedFd};
use tokio::sync::mpsc;

/// Fixed netlink message header length: length, type, flags, sequence, pid.
const NLMSG_HDRLEN: usize = 16;

/// Kernel read buffer. Netlink datagrams are bounded well below this.
const READ_BUFFER_LEN: usize = 64 * 1024;

/// Upper bound on how long a stop request can go unobserved.
const READ_TIMEOUT_MS: i64 = 500;

/// Linux implementation of [`EventSource`] backed by rtnetlink.
///
/// The netlink socket is opened when [`EventSource::into_stream`] is called
/// and owned by the reader thread; dropping the returned stream releases it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxEventSource {
    _private: (),
}

impl LinuxEventSource {
    /// Creates a new Linux event source.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl EventSource for LinuxEventSource {
    type Stream = ReaderStream;

    fn into_stream(self) -> Self::Stream {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stop = StopFlag::new();
        let thread_stop = stop.clone();

        std::thread::spawn(move || {
            let fd = match open_netlink_socket() {
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

/// Opens the rtnetlink socket bound to the change-notification groups.
///
/// # Coverage Note
///
/// Excluded from coverage: requires a live kernel netlink endpoint.
#[cfg(not(tarpaulin_include))]
fn open_netlink_socket() -> Result<OwnedFd, SourceError> {
    let fd = socket(
        AddressFamily::Netlink,
        SockType::Raw,
        SockFlag::SOCK_CLOEXEC,
        SockProtocol::NetlinkRoute,
    )
    .map_err(|e| SourceError::Setup(e.into()))?;

    let groups = libc::RTMGRP_LINK
        | libc::RTMGRP_IPV4_IFADDR
        | libc::RTMGRP_IPV6_IFADDR
        | libc::RTMGRP_IPV4_ROUTE
        | libc::RTMGRP_IPV6_ROUTE;
    let addr = NetlinkAddr::new(0, groups as u32);
    bind(fd.as_raw_fd(), &addr).map_err(|e| SourceError::Setup(e.into()))?;

    // Bounded blocking so the reader can observe its stop flag.
    setsockopt(
        &fd,
        sockopt::ReceiveTimeout,
        &TimeVal::milliseconds(READ_TIMEOUT_MS),
    )
    .map_err(|e| SourceError::Setup(e.into()))?;

    Ok(fd)
}

/// Reader-thread loop: recv, decode, classify, forward.
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
                for msg_type in message_types(&buf[..n]) {
                    let Some(reason) = classify(msg_type) else {
                        tracing::trace!(msg_type, "ignoring unclassified netlink message");
                        continue;
                    };
                    if tx.try_send(Ok(OsEvent::new(reason))).is_err() && tx.is_closed() {
                        // Consumer gone; full-channel drops are harmless.
                        return;
                    }
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

/// Decodes the message types from a multiplexed netlink datagram.
///
/// Length-checked structured decode of each 16-byte header: a header must
/// fit in the remaining buffer, its advertised length must cover at least
/// the header itself and must not run past the buffer. Anything after a
/// malformed header is dropped; losing tokens is harmless downstream.
fn message_types(mut buf: &[u8]) -> Vec<u16> {
    let mut types = Vec::new();
    while buf.len() >= NLMSG_HDRLEN {
        let len = read_u32(buf) as usize;
        let msg_type = read_u16(&buf[4..]);
        if len < NLMSG_HDRLEN || len > buf.len() {
            tracing::trace!(len, "malformed netlink header, dropping remainder");
            break;
        }
        types.push(msg_type);

        // Messages are aligned to 4-byte boundaries.
        let advance = (len + 3) & !3;
        if advance >= buf.len() {
            break;
        }
        buf = &buf[advance..];
    }
    types
}

/// Maps an rtnetlink message type to a change reason.
const fn classify(msg_type: u16) -> Option<ChangeReason> {
    match msg_type {
        libc::RTM_NEWROUTE | libc::RTM_DELROUTE => Some(ChangeReason::Route),
        libc::RTM_NEWADDR | libc::RTM_DELADDR => Some(ChangeReason::Address),
        libc::RTM_NEWLINK | libc::RTM_DELLINK => Some(ChangeReason::Link),
        _ => None,
    }
}

fn read_u32(b: &[u8]) -> u32 {
    u32::from_ne_bytes([b[0], b[1], b[2], b[3]])
}

fn read_u16(b: &[u8]) -> u16 {
    u16::from_ne_bytes([b[0], b[1]])
}
