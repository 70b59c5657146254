//! Error types for OS event sources.

use thiserror::Error;

/// Error type for kernel notification subscriptions.
///
/// Every variant is fatal for the source that produced it: after an `Err`
/// item the token stream terminates and the consumer should restart the
/// watcher if it still wants notifications.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Opening or binding the kernel notification socket failed.
    #[cfg(unix)]
    #[error("event subscription setup failed: {0}")]
    Setup(#[source] std::io::Error),

    /// A kernel read failed with something other than an interrupt.
    #[cfg(unix)]
    #[error("kernel event read failed: {0}")]
    Read(#[source] std::io::Error),

    /// Registering a change notification with the IP Helper API failed.
    #[cfg(windows)]
    #[error("notification registration failed: {0}")]
    Register(#[from] windows::core::Error),

    /// The source stopped without an explicit shutdown request.
    #[error("event source stopped unexpectedly")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_displays_message() {
        let error = SourceError::Stopped;
        assert_eq!(error.to_string(), "event source stopped unexpectedly");
    }

    #[cfg(unix)]
    #[test]
    fn setup_preserves_source() {
        use std::error::Error;

        let io = std::io::Error::from_raw_os_error(libc::EPERM);
        let error = SourceError::Setup(io);

        assert!(error.to_string().contains("setup failed"));
        assert!(error.source().is_some());
    }
}
