//! macOS / FreeBSD online evaluator using routing-table sysctl dumps.
//!
//! Layers, in order: default route (a `NET_RT_DUMP` sysctl per address
//! family, scanning for an all-zero destination), route interface
//! (`if_indextoname` on the message's interface index), interface flags,
//! usable address, DNS resolver (`/etc/resolv.conf`). There is no neighbor
//! layer here; the routing socket does not expose ARP state the way Linux
//! procfs does.

use crate::online::addr::is_usable;
use crate::online::ifaces::{IfaceTable, SystemIfaceTable};
use crate::online::resolv;
use crate::online::{EvalError, OnlineEvaluator, OnlineSnapshot};
use std::io;
use std::mem;
use std::os::raw::c_int;
use std::path::PathBuf;
use std::ptr;

/// BSD implementation of [`OnlineEvaluator`].
#[derive(Debug)]
pub struct BsdEvaluator<T = SystemIfaceTable> {
    resolv_path: PathBuf,
    ifaces: T,
}

impl BsdEvaluator<SystemIfaceTable> {
    /// Creates an evaluator reading the live routing tables.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts("/etc/resolv.conf", SystemIfaceTable)
    }
}

impl Default for BsdEvaluator<SystemIfaceTable> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IfaceTable> BsdEvaluator<T> {
    /// Creates an evaluator with an explicit resolv.conf path and interface
    /// table.
    #[must_use]
    pub fn with_parts(resolv_path: impl Into<PathBuf>, ifaces: T) -> Self {
        Self {
            resolv_path: resolv_path.into(),
            ifaces,
        }
    }

    fn default_route_ifindex(&self) -> Result<Option<u32>, EvalError> {
        for family in [libc::AF_INET, libc::AF_INET6] {
            let table = fetch_route_table(family)?;
            if let Some(index) = default_route_ifindex_in(&table) {
                return Ok(Some(u32::from(index)));
            }
        }
        Ok(None)
    }
}

impl<T: IfaceTable> OnlineEvaluator for BsdEvaluator<T> {
    fn evaluate(&self) -> Result<OnlineSnapshot, EvalError> {
        let Some(index) = self.default_route_ifindex()? else {
            return Ok(OnlineSnapshot::offline("no default route"));
        };
        let Some(name) = self.ifaces.name_by_index(index) else {
            return Ok(OnlineSnapshot::offline("default route no iface"));
        };
        match self.ifaces.flags(&name) {
            Some(flags) if flags.up && !flags.loopback => {}
            _ => return Ok(OnlineSnapshot::offline("default iface down/loopback")),
        }
        if !self.ifaces.addrs(&name).into_iter().any(is_usable) {
            return Ok(OnlineSnapshot::offline("default iface has no usable IP"));
        }
        if !resolv::file_has_nameserver(&self.resolv_path, false) {
            return Ok(OnlineSnapshot::offline("no DNS resolver"));
        }
        Ok(OnlineSnapshot::online(format!("default via {name}")))
    }
}

/// Dumps the routing table for one address family.
///
/// # Coverage Note
///
/// Excluded from coverage: requires the live routing sysctl.
#[cfg(not(tarpaulin_include))]
fn fetch_route_table(family: c_int) -> Result<Vec<u8>, EvalError> {
    let mut mib = [
        libc::CTL_NET,
        libc::PF_ROUTE,
        0,
        family,
        libc::NET_RT_DUMP,
        0,
    ];
    let mut len: libc::size_t = 0;

    // SAFETY: mib names a valid sysctl; the first call sizes the buffer.
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            6,
            ptr::null_mut(),
            &raw mut len,
            ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(EvalError::Route(io::Error::last_os_error()));
    }

    let mut buf = vec![0u8; len];
    // SAFETY: buf holds at least `len` bytes; the kernel updates `len` to
    // the bytes actually written.
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            6,
            buf.as_mut_ptr().cast(),
            &raw mut len,
            ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(EvalError::Route(io::Error::last_os_error()));
    }
    buf.truncate(len);
    Ok(buf)
}

/// Scans a routing-table dump for a route whose destination is the all-zero
/// address, returning its interface index.
///
/// Each record is an `rt_msghdr` followed by sockaddrs in `rtm_addrs` order;
/// `RTA_DST` is the lowest bit, so when present the destination is the first
/// sockaddr. Records are length-checked before being read; a malformed
/// record ends the scan.
fn default_route_ifindex_in(buf: &[u8]) -> Option<u16> {
    let hdr_len = mem::size_of::<libc::rt_msghdr>();
    let mut offset = 0;
    while offset + hdr_len <= buf.len() {
        // SAFETY: at least `hdr_len` bytes remain at `offset`, and
        // read_unaligned tolerates arbitrary alignment.
        let hdr: libc::rt_msghdr =
            unsafe { ptr::read_unaligned(buf.as_ptr().add(offset).cast()) };
        let msg_len = hdr.rtm_msglen as usize;
        if msg_len < hdr_len || offset + msg_len > buf.len() {
            break;
        }
        if hdr.rtm_addrs & libc::RTA_DST != 0
            && sockaddr_is_any(&buf[offset + hdr_len..offset + msg_len])
        {
            return Some(hdr.rtm_index);
        }
        offset += msg_len;
    }
    None
}

/// True if the sockaddr at the start of `data` is the all-zero address of
/// its family.
fn sockaddr_is_any(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }
    // BSD sockaddrs lead with sa_len, then sa_family.
    let family = c_int::from(data[1]);
    if family == libc::AF_INET {
        data.len() >= 8 && data[4..8].iter().all(|&b| b == 0)
    } else if family == libc::AF_INET6 {
        data.len() >= 24 && data[8..24].iter().all(|&b| b == 0)
    } else {
        false
    }
}
