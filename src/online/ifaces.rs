//! Interface table lookups for the unix evaluators.

use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use std::net::IpAddr;

/// Up/loopback summary of one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfaceFlags {
    /// Administratively up.
    pub up: bool,
    /// Loopback device.
    pub loopback: bool,
}

/// Source of interface facts for an evaluator.
///
/// The production implementation is [`SystemIfaceTable`]; tests substitute a
/// fabricated table so evaluations can reference interfaces that do not
/// exist on the machine running the tests.
pub trait IfaceTable: Send + Sync {
    /// Flags for the named interface, or `None` if it does not exist.
    fn flags(&self, name: &str) -> Option<IfaceFlags>;

    /// All addresses assigned to the named interface.
    fn addrs(&self, name: &str) -> Vec<IpAddr>;

    /// Resolves a kernel interface index to its name.
    fn name_by_index(&self, index: u32) -> Option<String>;
}

/// Live interface table backed by `getifaddrs(3)` and `if_indextoname(3)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIfaceTable;

impl IfaceTable for SystemIfaceTable {
    fn flags(&self, name: &str) -> Option<IfaceFlags> {
        let entries = getifaddrs().ok()?;
        for entry in entries {
            if entry.interface_name == name {
                return Some(IfaceFlags {
                    up: entry.flags.contains(InterfaceFlags::IFF_UP),
                    loopback: entry.flags.contains(InterfaceFlags::IFF_LOOPBACK),
                });
            }
        }
        None
    }

    fn addrs(&self, name: &str) -> Vec<IpAddr> {
        let Ok(entries) = getifaddrs() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for entry in entries {
            if entry.interface_name != name {
                continue;
            }
            let Some(storage) = entry.address else {
                continue;
            };
            if let Some(sin) = storage.as_sockaddr_in() {
                out.push(IpAddr::V4(sin.ip()));
            } else if let Some(sin6) = storage.as_sockaddr_in6() {
                out.push(IpAddr::V6(sin6.ip()));
            }
        }
        out
    }

    fn name_by_index(&self, index: u32) -> Option<String> {
        // Comfortably larger than IFNAMSIZ on every supported platform.
        let mut buf = [0u8; 64];
        // SAFETY: buf outlives the call and exceeds IFNAMSIZ; the function
        // writes a NUL-terminated name or returns null.
        let res = unsafe { libc::if_indextoname(index, buf.as_mut_ptr().cast()) };
        if res.is_null() {
            return None;
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        std::str::from_utf8(&buf[..end]).ok().map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    const LOOPBACK: &str = "lo";
    #[cfg(not(target_os = "linux"))]
    const LOOPBACK: &str = "lo0";

    #[test]
    fn loopback_interface_is_flagged() {
        let table = SystemIfaceTable;
        let flags = table.flags(LOOPBACK).expect("no loopback interface");
        assert!(flags.loopback);
    }

    #[test]
    fn loopback_has_loopback_address() {
        let table = SystemIfaceTable;
        let addrs = table.addrs(LOOPBACK);
        assert!(addrs.iter().any(|a| a.is_loopback()), "got {addrs:?}");
    }

    #[test]
    fn unknown_interface_has_no_flags_or_addrs() {
        let table = SystemIfaceTable;
        assert!(table.flags("does-not-exist0").is_none());
        assert!(table.addrs("does-not-exist0").is_empty());
    }

    #[test]
    fn index_zero_is_invalid() {
        assert!(SystemIfaceTable.name_by_index(0).is_none());
    }
}
