//! Platform-specific event source implementations.
//!
//! This module provides conditional compilation for platform-specific
//! implementations of the [`EventSource`] trait.
//!
//! # Platform Support
//!
//! - **Linux**: `NETLINK_ROUTE` socket subscribed to link/address/route groups.
//! - **macOS / FreeBSD**: `PF_ROUTE` routing socket, any family.
//! - **Windows**: `NotifyIpInterfaceChange` + `NotifyRouteChange2` callbacks.
//!
//! [`EventSource`]: super::EventSource

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
mod bsd;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(unix)]
mod reader;
#[cfg(windows)]
mod windows;

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
pub use bsd::BsdEventSource;
#[cfg(target_os = "linux")]
pub use linux::LinuxEventSource;
#[cfg(unix)]
pub use reader::ReaderStream;
#[cfg(windows)]
pub use windows::{WindowsEventSource, WindowsEventStream};

// Re-export the platform implementation as PlatformEventSource for convenience
#[cfg(target_os = "linux")]
pub use linux::LinuxEventSource as PlatformEventSource;

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
pub use bsd::BsdEventSource as PlatformEventSource;

#[cfg(windows)]
pub use windows::WindowsEventSource as PlatformEventSource;
