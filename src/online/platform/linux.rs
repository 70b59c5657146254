//! Linux online evaluator reading procfs and sysfs.
//!
//! Layers, in order: default route (`/proc/net/route`, then
//! `/proc/net/ipv6_route`), route interface, interface operational state
//! (interface flags plus sysfs `operstate`/`carrier`), usable address,
//! gateway neighbor readiness (`/proc/net/arp`), DNS resolver
//! (systemd-resolved upstream file, then `/etc/resolv.conf`).

use crate::online::addr::is_usable;
use crate::online::ifaces::{IfaceTable, SystemIfaceTable};
use crate::online::resolv;
use crate::online::{EvalError, OnlineEvaluator, OnlineSnapshot};
use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Route flag: route is usable (`RTF_UP`).
const RTF_UP: u64 = 0x1;

/// Neighbor flag: entry is complete (`ATF_COM`).
const ATF_COM: u64 = 0x2;

/// A MAC the kernel prints for entries it has never filled in.
const ZERO_MAC: &str = "00:00:00:00:00:00";

/// Linux implementation of [`OnlineEvaluator`].
///
/// The procfs/sysfs roots and resolv.conf search path are fields so tests
/// can point the evaluator at fabricated trees; production use goes through
/// [`LinuxEvaluator::new`].
#[derive(Debug)]
pub struct LinuxEvaluator<T = SystemIfaceTable> {
    proc_root: PathBuf,
    sys_class_net: PathBuf,
    resolv_paths: Vec<PathBuf>,
    ifaces: T,
}

impl LinuxEvaluator<SystemIfaceTable> {
    /// Creates an evaluator reading the real procfs/sysfs trees.
    #[must_use]
    pub fn new() -> Self {
        Self::with_roots(
            "/proc",
            "/sys/class/net",
            vec![
                PathBuf::from("/run/systemd/resolve/resolv.conf"),
                PathBuf::from("/etc/resolv.conf"),
            ],
            SystemIfaceTable,
        )
    }
}

impl Default for LinuxEvaluator<SystemIfaceTable> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IfaceTable> LinuxEvaluator<T> {
    /// Creates an evaluator over explicit roots and an injected interface
    /// table.
    #[must_use]
    pub fn with_roots(
        proc_root: impl Into<PathBuf>,
        sys_class_net: impl Into<PathBuf>,
        resolv_paths: Vec<PathBuf>,
        ifaces: T,
    ) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_class_net: sys_class_net.into(),
            resolv_paths,
            ifaces,
        }
    }

    fn default_route(&self) -> Result<Option<DefaultRoute>, EvalError> {
        match std::fs::read_to_string(self.proc_root.join("net/route")) {
            Ok(table) => {
                if let Some(route) = default_ipv4_route(&table) {
                    return Ok(Some(route));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(EvalError::Route(e)),
        }

        match std::fs::read_to_string(self.proc_root.join("net/ipv6_route")) {
            Ok(table) => Ok(default_ipv6_route(&table)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EvalError::Route(e)),
        }
    }

    /// Interface flags plus sysfs operational state.
    ///
    /// Missing sysfs files skip their check rather than failing: containers
    /// and unusual drivers do not always expose them.
    fn iface_operational(&self, name: &str) -> Result<bool, EvalError> {
        if let Some(flags) = self.ifaces.flags(name) {
            if !flags.up || flags.loopback {
                return Ok(false);
            }
        }

        let operstate = self.sys_class_net.join(name).join("operstate");
        match std::fs::read_to_string(&operstate) {
            Ok(s) => {
                let s = s.trim();
                if s != "up" && s != "unknown" {
                    return Ok(false);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(EvalError::InterfaceState(e)),
        }

        let carrier = self.sys_class_net.join(name).join("carrier");
        match std::fs::read_to_string(&carrier) {
            Ok(s) => {
                if s.trim() != "1" {
                    return Ok(false);
                }
            }
            // carrier reads fail with EINVAL while the interface is
            // admin-down; operstate already caught that case.
            Err(e)
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(EvalError::InterfaceState(e)),
        }

        Ok(true)
    }

    /// An unreadable neighbor table passes: permission problems must not
    /// fake an outage.
    fn neighbor_ready(&self, gateway: Ipv4Addr, iface: &str) -> bool {
        let Ok(table) = std::fs::read_to_string(self.proc_root.join("net/arp")) else {
            return true;
        };
        neighbor_complete(&table, gateway, iface)
    }

    fn has_dns_resolver(&self) -> bool {
        self.resolv_paths
            .iter()
            .any(|p| resolv::file_has_nameserver(p, true))
    }
}

impl<T: IfaceTable> OnlineEvaluator for LinuxEvaluator<T> {
    fn evaluate(&self) -> Result<OnlineSnapshot, EvalError> {
        let Some(route) = self.default_route()? else {
            return Ok(OnlineSnapshot::offline("no default route"));
        };
        if route.iface.is_empty() {
            return Ok(OnlineSnapshot::offline("default route no iface"));
        }
        if !self.iface_operational(&route.iface)? {
            return Ok(OnlineSnapshot::offline("default iface down"));
        }
        if !self
            .ifaces
            .addrs(&route.iface)
            .into_iter()
            .any(is_usable)
        {
            return Ok(OnlineSnapshot::offline("default iface has no usable IP"));
        }
        // An IPv6 or on-link default route has no IPv4 gateway to resolve.
        if let Some(gateway) = route.gateway {
            if !self.neighbor_ready(gateway, &route.iface) {
                return Ok(OnlineSnapshot::offline("gateway neighbor not ready"));
            }
        }
        if !self.has_dns_resolver() {
            return Ok(OnlineSnapshot::offline("no DNS resolver"));
        }
        Ok(OnlineSnapshot::online(format!("default via {}", route.iface)))
    }
}

/// A parsed default route.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DefaultRoute {
    iface: String,
    /// IPv4 next hop, absent for IPv6 and on-link routes.
    gateway: Option<Ipv4Addr>,
}

/// Scans `/proc/net/route` for an up route with an all-zero destination.
///
/// Columns: iface, destination, gateway, flags, refcnt, use, metric, mask,
/// mtu, window, irtt. Destination and gateway are little-endian hex.
fn default_ipv4_route(table: &str) -> Option<DefaultRoute> {
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 11 {
            continue;
        }
        let (iface, dest, gateway, flags) = (fields[0], fields[1], fields[2], fields[3]);
        if dest != "00000000" {
            continue;
        }
        let Ok(flags) = u64::from_str_radix(flags, 16) else {
            continue;
        };
        if flags & RTF_UP == 0 {
            continue;
        }
        return Some(DefaultRoute {
            iface: iface.to_owned(),
            gateway: hex_to_ipv4(gateway).filter(|gw| !gw.is_unspecified()),
        });
    }
    None
}

/// Scans `/proc/net/ipv6_route` for an up route with a zero-length
/// destination prefix.
///
/// Columns: destination, destination prefix length, source, source prefix
/// length, next hop, metric, refcnt, use, flags, device name. The flags
/// check matters: kernels keep an all-zero-prefix *reject* route via `lo`
/// that must not count as a default path.
fn default_ipv6_route(table: &str) -> Option<DefaultRoute> {
    for line in table.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        if fields[1] != "00" {
            continue;
        }
        let Ok(flags) = u64::from_str_radix(fields[8], 16) else {
            continue;
        };
        if flags & RTF_UP == 0 {
            continue;
        }
        return Some(DefaultRoute {
            iface: fields[9].to_owned(),
            gateway: None,
        });
    }
    None
}

/// Decodes procfs little-endian address hex ("0101010A" is 10.1.1.1).
fn hex_to_ipv4(hex: &str) -> Option<Ipv4Addr> {
    if hex.len() != 8 {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some(Ipv4Addr::from(value.swap_bytes()))
}

/// True if the neighbor table holds a complete, non-placeholder entry for
/// `gateway` on `iface`. An absent entry means the gateway was never
/// resolved, which is not ready.
fn neighbor_complete(table: &str, gateway: Ipv4Addr, iface: &str) -> bool {
    let gateway = gateway.to_string();
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            continue;
        }
        let (ip, flags, mac, dev) = (fields[0], fields[2], fields[3], fields[5]);
        if dev != iface || ip != gateway {
            continue;
        }
        let flags = parse_neighbor_flags(flags).unwrap_or(0);
        if flags & ATF_COM == 0 {
            return false;
        }
        if mac == ZERO_MAC {
            return false;
        }
        return true;
    }
    false
}

/// The kernel prints neighbor flags as `0x%x`; accept bare decimal too.
fn parse_neighbor_flags(s: &str) -> Option<u64> {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .map_or_else(|| s.parse().ok(), |hex| u64::from_str_radix(hex, 16).ok())
}

#[cfg(test)]
#[path = "linux_tests.rs"]
mod tests;
