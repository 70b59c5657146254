//! Platform-specific online evaluator implementations.
//!
//! This module provides conditional compilation for platform-specific
//! implementations of the [`OnlineEvaluator`] trait.
//!
//! # Platform Support
//!
//! - **Linux**: procfs routing/neighbor tables + sysfs link state.
//! - **macOS / FreeBSD**: routing-table sysctl dumps + `getifaddrs`.
//! - **Windows**: `GetAdaptersAddresses` with a `GetBestInterfaceEx` fallback.
//!
//! [`OnlineEvaluator`]: super::OnlineEvaluator

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
mod bsd;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(windows)]
mod windows;

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
pub use bsd::BsdEvaluator;
#[cfg(target_os = "linux")]
pub use linux::LinuxEvaluator;
#[cfg(windows)]
pub use windows::WindowsEvaluator;

// Re-export the platform implementation as PlatformEvaluator for convenience
#[cfg(target_os = "linux")]
pub use linux::LinuxEvaluator as PlatformEvaluator;

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
pub use bsd::BsdEvaluator as PlatformEvaluator;

#[cfg(windows)]
pub use windows::WindowsEvaluator as PlatformEvaluator;
