//! Error types for the watch layer.

use crate::online::EvalError;
use crate::source::SourceError;
use thiserror::Error;

/// Error type surfaced on the watcher's error stream.
///
/// The watcher re-broadcasts source errors without interpretation and keeps
/// running on its timer; an evaluation error means one re-check was skipped,
/// nothing more. A consumer that ignores this stream still receives
/// best-effort change events.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The OS event source failed; no further kernel tokens will arrive.
    #[error("event source failed: {0}")]
    Source(#[from] SourceError),

    /// An online evaluation failed.
    #[error("online evaluation failed: {0}")]
    Evaluate(#[from] EvalError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn source_error_displays_with_context() {
        let error = WatchError::from(SourceError::Stopped);
        assert!(error.to_string().contains("event source failed"));
        assert!(error.source().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn evaluate_error_preserves_source_chain() {
        let eval = EvalError::Route(std::io::Error::from_raw_os_error(libc::EACCES));
        let error = WatchError::from(eval);

        assert!(error.to_string().contains("online evaluation failed"));
        assert!(error.source().unwrap().to_string().contains("default route"));
    }
}
