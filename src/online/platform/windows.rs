//! Windows online evaluator using `GetAdaptersAddresses`.
//!
//! The primary path enumerates adapters (gateways included) and looks for an
//! operational, non-loopback adapter that carries a default gateway. When
//! that fails, the routing engine is asked directly which interface it would
//! use to reach a public address (`GetBestInterfaceEx`, IPv6 then IPv4), and
//! as a last resort any operational adapter holding a usable address is
//! accepted with a `"fallback: "` cause.

use crate::online::addr::is_usable;
use crate::online::{EvalError, OnlineEvaluator, OnlineSnapshot};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ptr;
use windows::Win32::Foundation::{ERROR_BUFFER_OVERFLOW, NO_ERROR, WIN32_ERROR};
use windows::Win32::NetworkManagement::IpHelper::{
    GetAdaptersAddresses, GetBestInterfaceEx, GAA_FLAG_INCLUDE_GATEWAYS, GAA_FLAG_SKIP_ANYCAST,
    GAA_FLAG_SKIP_MULTICAST, GET_ADAPTERS_ADDRESSES_FLAGS, IF_TYPE_SOFTWARE_LOOPBACK,
    IP_ADAPTER_ADDRESSES_LH,
};
use windows::Win32::NetworkManagement::Ndis::IfOperStatusUp;
use windows::Win32::Networking::WinSock::{
    AF_INET, AF_INET6, AF_UNSPEC, SOCKADDR, SOCKADDR_IN, SOCKADDR_IN6,
};

/// Buffer size hint for `GetAdaptersAddresses`; the API reports the exact
/// size when this is insufficient.
const INITIAL_BUFFER_SIZE: u32 = 16384;

/// Anycast resolver addresses used only as routing-engine lookup keys.
/// No packets are sent to them.
const V6_PROBE: Ipv6Addr = Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1111);
const V4_PROBE: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);

/// Windows implementation of [`OnlineEvaluator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsEvaluator {
    _private: (),
}

impl WindowsEvaluator {
    /// Creates a new Windows evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl OnlineEvaluator for WindowsEvaluator {
    fn evaluate(&self) -> Result<OnlineSnapshot, EvalError> {
        let adapters = query_adapters()?;
        let best = if has_gateway_adapter(&adapters) {
            None
        } else {
            best_interface_adapter(&adapters)
        };
        Ok(decide(&adapters, best))
    }
}

/// Everything the heuristic needs to know about one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AdapterFacts {
    name: String,
    index: u32,
    ipv6_index: u32,
    operational: bool,
    loopback: bool,
    has_gateway: bool,
    has_dns: bool,
    addrs: Vec<IpAddr>,
}

fn has_gateway_adapter(adapters: &[AdapterFacts]) -> bool {
    gateway_adapter(adapters).is_some()
}

fn gateway_adapter(adapters: &[AdapterFacts]) -> Option<&AdapterFacts> {
    adapters
        .iter()
        .find(|a| a.operational && !a.loopback && a.has_gateway)
}

fn has_dns(adapters: &[AdapterFacts]) -> bool {
    adapters.iter().any(|a| a.has_dns)
}

/// The pure decision over gathered facts: gateway enumeration first, then
/// the routing-engine answer, then the last-resort scan.
fn decide<'a>(adapters: &'a [AdapterFacts], best: Option<&'a AdapterFacts>) -> OnlineSnapshot {
    if let Some(adapter) = gateway_adapter(adapters).or(best) {
        if !adapter.operational || adapter.loopback {
            return OnlineSnapshot::offline("default iface down/loopback");
        }
        if !adapter.addrs.iter().copied().any(is_usable) {
            return OnlineSnapshot::offline("default iface has no usable IP");
        }
        if !has_dns(adapters) {
            return OnlineSnapshot::offline("no DNS resolver");
        }
        return OnlineSnapshot::online(format!("default via {}", adapter.name));
    }

    if let Some(adapter) = adapters
        .iter()
        .find(|a| a.operational && !a.loopback && a.addrs.iter().copied().any(is_usable))
    {
        if !has_dns(adapters) {
            return OnlineSnapshot::offline("no DNS resolver");
        }
        return OnlineSnapshot::online(format!("fallback: up iface {}", adapter.name));
    }

    OnlineSnapshot::offline("no default route")
}

/// Asks the routing engine which interface reaches a public address, IPv6
/// first, and returns the matching operational non-loopback adapter.
///
/// # Coverage Note
///
/// Excluded from coverage: requires the live IP Helper API.
#[cfg(not(tarpaulin_include))]
fn best_interface_adapter(adapters: &[AdapterFacts]) -> Option<&AdapterFacts> {
    for index in [best_interface_v6(V6_PROBE), best_interface_v4(V4_PROBE)] {
        let Some(index) = index else {
            continue;
        };
        let found = adapters
            .iter()
            .find(|a| a.index == index || a.ipv6_index == index);
        if let Some(adapter) = found {
            if adapter.operational && !adapter.loopback {
                return Some(adapter);
            }
        }
    }
    None
}

/// # Coverage Note
///
/// Excluded from coverage: requires the live IP Helper API.
#[cfg(not(tarpaulin_include))]
fn best_interface_v4(dest: Ipv4Addr) -> Option<u32> {
    let mut addr = SOCKADDR_IN::default();
    addr.sin_family = AF_INET;
    addr.sin_addr.S_un.S_addr = u32::from_ne_bytes(dest.octets());

    let mut index = 0u32;
    // SAFETY: addr is a valid SOCKADDR_IN viewed through the generic
    // SOCKADDR header the API expects.
    let result = unsafe { GetBestInterfaceEx(ptr::from_ref(&addr).cast::<SOCKADDR>(), &raw mut index) };
    (result == NO_ERROR.0).then_some(index)
}

/// # Coverage Note
///
/// Excluded from coverage: requires the live IP Helper API.
#[cfg(not(tarpaulin_include))]
fn best_interface_v6(dest: Ipv6Addr) -> Option<u32> {
    let mut addr = SOCKADDR_IN6::default();
    addr.sin6_family = AF_INET6;
    addr.sin6_addr.u.Byte = dest.octets();

    let mut index = 0u32;
    // SAFETY: addr is a valid SOCKADDR_IN6 viewed through the generic
    // SOCKADDR header the API expects.
    let result = unsafe { GetBestInterfaceEx(ptr::from_ref(&addr).cast::<SOCKADDR>(), &raw mut index) };
    (result == NO_ERROR.0).then_some(index)
}

/// Fetches adapter facts with gateways and DNS-server chains included.
fn query_adapters() -> Result<Vec<AdapterFacts>, EvalError> {
    let buffer = get_adapter_addresses()?;

    let mut adapters = Vec::new();
    // SAFETY: GetAdaptersAddresses returns a properly aligned buffer for
    // IP_ADAPTER_ADDRESSES_LH.
    #[allow(clippy::cast_ptr_alignment)]
    let mut current = buffer.as_ptr().cast::<IP_ADAPTER_ADDRESSES_LH>();

    // SAFETY: we walk a linked list laid out inside `buffer`, which stays
    // alive for the whole loop.
    while !current.is_null() {
        let adapter = unsafe { &*current };
        if let Some(facts) = parse_adapter(adapter) {
            adapters.push(facts);
        }
        current = adapter.Next;
    }

    Ok(adapters)
}

/// Calls `GetAdaptersAddresses` with the two-call buffer-sizing pattern.
///
/// # Coverage Note
///
/// Excluded from coverage: requires the live IP Helper API.
#[cfg(not(tarpaulin_include))]
fn get_adapter_addresses() -> Result<Vec<u8>, EvalError> {
    let flags = GAA_FLAG_INCLUDE_GATEWAYS | GAA_FLAG_SKIP_ANYCAST | GAA_FLAG_SKIP_MULTICAST;
    let family = u32::from(AF_UNSPEC.0);

    let mut buffer: Vec<u8> = vec![0u8; INITIAL_BUFFER_SIZE as usize];
    let mut size = INITIAL_BUFFER_SIZE;

    // SAFETY: buffer and size are valid; the API writes adapter data and
    // updates size with the required length.
    let result = unsafe {
        GetAdaptersAddresses(
            family,
            flags,
            None,
            Some(buffer.as_mut_ptr().cast()),
            &raw mut size,
        )
    };
    handle_api_result(result, &mut buffer, &mut size, flags, family)?;

    Ok(buffer)
}

/// Retries once with the exact size on buffer overflow.
///
/// # Coverage Note
///
/// Excluded from coverage: requires the live IP Helper API.
#[cfg(not(tarpaulin_include))]
fn handle_api_result(
    result: u32,
    buffer: &mut Vec<u8>,
    size: &mut u32,
    flags: GET_ADAPTERS_ADDRESSES_FLAGS,
    family: u32,
) -> Result<(), EvalError> {
    if result == ERROR_BUFFER_OVERFLOW.0 {
        buffer.resize(*size as usize, 0);

        // SAFETY: as above, with the correctly sized buffer.
        let result = unsafe {
            GetAdaptersAddresses(
                family,
                flags,
                None,
                Some(buffer.as_mut_ptr().cast()),
                &raw mut *size,
            )
        };
        if result != NO_ERROR.0 {
            return Err(windows::core::Error::from(WIN32_ERROR(result)).into());
        }
    } else if result != NO_ERROR.0 {
        return Err(windows::core::Error::from(WIN32_ERROR(result)).into());
    }

    Ok(())
}

/// Extracts the facts the heuristic needs from one adapter entry.
///
/// Returns `None` if the friendly name cannot be read.
fn parse_adapter(adapter: &IP_ADAPTER_ADDRESSES_LH) -> Option<AdapterFacts> {
    // SAFETY: FriendlyName points into the adapter buffer and is
    // NUL-terminated.
    let name = unsafe { adapter.FriendlyName.to_string().ok()? };

    // SAFETY: both union views share a layout whose second dword is the
    // interface index.
    let index = unsafe { adapter.Anonymous1.Anonymous.IfIndex };

    Some(AdapterFacts {
        name,
        index,
        ipv6_index: adapter.Ipv6IfIndex,
        operational: adapter.OperStatus == IfOperStatusUp,
        loopback: adapter.IfType == IF_TYPE_SOFTWARE_LOOPBACK,
        has_gateway: !adapter.FirstGatewayAddress.is_null(),
        has_dns: !adapter.FirstDnsServerAddress.is_null(),
        addrs: collect_addresses(adapter),
    })
}

/// Collects unicast addresses from an adapter's linked list.
#[allow(clippy::cast_ptr_alignment)]
fn collect_addresses(adapter: &IP_ADAPTER_ADDRESSES_LH) -> Vec<IpAddr> {
    let mut addrs = Vec::new();
    let mut unicast = adapter.FirstUnicastAddress;

    // SAFETY: we walk a linked list of unicast addresses valid for the
    // lifetime of the parent adapter buffer.
    while !unicast.is_null() {
        let entry = unsafe { &*unicast };

        // SAFETY: Address holds a valid SOCKET_ADDRESS pointing to either a
        // SOCKADDR_IN or SOCKADDR_IN6, discriminated by sa_family.
        if let Some(sockaddr) = unsafe { entry.Address.lpSockaddr.as_ref() } {
            match sockaddr.sa_family {
                f if f == AF_INET => {
                    // SAFETY: family verified as AF_INET.
                    let sockaddr_in =
                        unsafe { &*(ptr::from_ref(sockaddr).cast::<SOCKADDR_IN>()) };
                    // SAFETY: sin_addr holds the address bytes in network order.
                    let octets = unsafe { sockaddr_in.sin_addr.S_un.S_un_b };
                    addrs.push(IpAddr::V4(Ipv4Addr::new(
                        octets.s_b1,
                        octets.s_b2,
                        octets.s_b3,
                        octets.s_b4,
                    )));
                }
                f if f == AF_INET6 => {
                    // SAFETY: family verified as AF_INET6.
                    let sockaddr_in6 =
                        unsafe { &*(ptr::from_ref(sockaddr).cast::<SOCKADDR_IN6>()) };
                    // SAFETY: the union holds address bytes for AF_INET6.
                    let octets = unsafe { sockaddr_in6.sin6_addr.u.Byte };
                    addrs.push(IpAddr::V6(Ipv6Addr::from(octets)));
                }
                _ => {}
            }
        }

        unicast = unsafe { (*unicast).Next };
    }

    addrs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(name: &str) -> AdapterFacts {
        AdapterFacts {
            name: name.to_owned(),
            index: 1,
            ipv6_index: 1,
            operational: true,
            loopback: false,
            has_gateway: false,
            has_dns: false,
            addrs: Vec::new(),
        }
    }

    fn online_ethernet() -> AdapterFacts {
        AdapterFacts {
            has_gateway: true,
            has_dns: true,
            addrs: vec!["192.168.1.42".parse().unwrap()],
            ..facts("Ethernet")
        }
    }

    #[test]
    fn gateway_adapter_reports_default_via() {
        let adapters = vec![online_ethernet()];
        let snapshot = decide(&adapters, None);

        assert!(snapshot.online);
        assert_eq!(snapshot.cause, "default via Ethernet");
    }

    #[test]
    fn loopback_and_down_adapters_are_not_candidates() {
        let mut loopback = online_ethernet();
        loopback.loopback = true;
        let mut down = online_ethernet();
        down.operational = false;

        let snapshot = decide(&[loopback, down], None);
        assert_eq!(snapshot.cause, "no default route");
    }

    #[test]
    fn gateway_without_usable_address_is_offline() {
        let mut adapter = online_ethernet();
        adapter.addrs = vec!["fe80::1".parse().unwrap()];

        let snapshot = decide(&[adapter], None);
        assert_eq!(snapshot.cause, "default iface has no usable IP");
    }

    #[test]
    fn missing_dns_chain_is_offline() {
        let mut adapter = online_ethernet();
        adapter.has_dns = false;

        let snapshot = decide(&[adapter], None);
        assert_eq!(snapshot.cause, "no DNS resolver");
    }

    #[test]
    fn dns_on_another_adapter_counts() {
        let mut gateway = online_ethernet();
        gateway.has_dns = false;
        let mut dns_only = facts("Wi-Fi");
        dns_only.has_dns = true;

        let snapshot = decide(&[gateway, dns_only], None);
        assert!(snapshot.online);
    }

    #[test]
    fn routing_engine_answer_is_used_when_no_gateway_is_listed() {
        let mut adapter = online_ethernet();
        adapter.has_gateway = false;
        let adapters = vec![adapter];

        let snapshot = decide(&adapters, Some(&adapters[0]));
        assert!(snapshot.online);
        assert_eq!(snapshot.cause, "default via Ethernet");
    }

    #[test]
    fn last_resort_scan_uses_fallback_cause() {
        let mut adapter = online_ethernet();
        adapter.has_gateway = false;

        let snapshot = decide(&[adapter], None);
        assert!(snapshot.online);
        assert_eq!(snapshot.cause, "fallback: up iface Ethernet");
    }

    #[test]
    fn last_resort_scan_still_requires_dns() {
        let mut adapter = online_ethernet();
        adapter.has_gateway = false;
        adapter.has_dns = false;

        let snapshot = decide(&[adapter], None);
        assert_eq!(snapshot.cause, "no DNS resolver");
    }

    #[test]
    fn no_adapters_means_no_default_route() {
        let snapshot = decide(&[], None);
        assert_eq!(snapshot.cause, "no default route");
    }

    // Integration test: the adapter query works on any Windows system.
    #[test]
    fn query_adapters_returns_loopback() {
        let adapters = query_adapters().expect("adapter query failed");
        assert!(adapters.iter().any(|a| a.loopback), "got {adapters:?}");
    }
}
