//! Online-state evaluation from kernel-visible facts.
//!
//! This module provides:
//! - The evaluation result ([`OnlineSnapshot`]) and evaluator abstraction
//!   ([`OnlineEvaluator`])
//! - Error handling ([`EvalError`])
//! - Platform-specific implementations ([`platform`])
//! - The one-shot [`evaluate`] convenience function
//!
//! "Online" is a local-stack predicate: a plausible default path to the
//! internet exists. The layered heuristic checks, in order, default route,
//! route interface, interface operational state, usable address, gateway
//! neighbor readiness (Linux), and DNS resolver configuration. No packets
//! are sent; nothing here verifies actual reachability.

mod addr;
mod error;
#[cfg(unix)]
mod ifaces;
pub mod platform;
#[cfg(unix)]
mod resolv;
mod snapshot;

pub use error::EvalError;
#[cfg(unix)]
pub use ifaces::{IfaceFlags, IfaceTable, SystemIfaceTable};
pub use snapshot::{OnlineEvaluator, OnlineSnapshot};

use platform::PlatformEvaluator;

/// Recomputes the passive online state right now.
///
/// Pure with respect to kernel state at the instant of the call; holds no
/// cross-call memory, so two calls with no intervening kernel change return
/// identical snapshots.
///
/// # Errors
///
/// Returns [`EvalError`] when kernel state cannot be read; callers wanting a
/// best-effort answer anyway can use
/// [`OnlineSnapshot::offline`]`(err.failure_cause())`.
///
/// # Example
///
/// ```no_run
/// let snapshot = netup::evaluate().expect("kernel state unreadable");
/// println!("online={} ({})", snapshot.online, snapshot.cause);
/// ```
pub fn evaluate() -> Result<OnlineSnapshot, EvalError> {
    PlatformEvaluator::default().evaluate()
}
