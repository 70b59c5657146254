//! resolv.conf parsing for the DNS-resolver layer.

use std::net::IpAddr;
use std::path::Path;

/// True if the file at `path` names at least one acceptable nameserver.
///
/// Unreadable files simply count as having none; the caller's verdict is
/// "no DNS resolver", not an evaluation error.
pub(crate) fn file_has_nameserver(path: &Path, require_routable: bool) -> bool {
    std::fs::read_to_string(path)
        .is_ok_and(|contents| has_nameserver(&contents, require_routable))
}

/// True if `contents` names at least one acceptable nameserver.
///
/// With `require_routable`, the nameserver must parse as a non-loopback
/// address: a local stub resolver (e.g. 127.0.0.53) says nothing about the
/// network, which is why the systemd-resolved upstream file is consulted
/// before `/etc/resolv.conf` on Linux.
pub(crate) fn has_nameserver(contents: &str, require_routable: bool) -> bool {
    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("nameserver") {
            continue;
        }
        let Some(value) = fields.next() else {
            continue;
        };
        if !require_routable {
            return true;
        }
        if value.parse::<IpAddr>().is_ok_and(|ip| !ip.is_loopback()) {
            return true;
        }
    }
    false
}
