//! Error types for online evaluation.

use thiserror::Error;

/// Error type for online-state evaluation.
///
/// Evaluation errors mean "could not read kernel state", not "offline". The
/// watcher surfaces them on its error stream and still emits a best-effort
/// offline result derived from [`EvalError::failure_cause`].
#[derive(Debug, Error)]
pub enum EvalError {
    /// The routing table could not be read.
    #[cfg(unix)]
    #[error("default route lookup failed: {0}")]
    Route(#[source] std::io::Error),

    /// Interface operational state could not be read.
    #[cfg(target_os = "linux")]
    #[error("interface state lookup failed: {0}")]
    InterfaceState(#[source] std::io::Error),

    /// The adapter-addresses query failed.
    #[cfg(windows)]
    #[error("adapter query failed: {0}")]
    AdapterQuery(#[from] windows::core::Error),
}

impl EvalError {
    /// Best-effort offline cause for when evaluation itself failed.
    #[must_use]
    pub const fn failure_cause(&self) -> &'static str {
        match self {
            #[cfg(unix)]
            Self::Route(_) => "default route check failed",
            #[cfg(target_os = "linux")]
            Self::InterfaceState(_) => "iface state check failed",
            #[cfg(windows)]
            Self::AdapterQuery(_) => "default route check failed",
        }
    }
}
