//! Online change event type.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A transition of the host's passive online state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineEvent {
    /// Whether a plausible default path to the internet now exists.
    pub online: bool,
    /// Wall-clock time at which the transition was observed.
    pub changed_at: SystemTime,
    /// Human-readable explanation. Diagnostic only; never parse it.
    pub cause: String,
}

impl OnlineEvent {
    /// Creates a new change event.
    #[must_use]
    pub fn new(online: bool, changed_at: SystemTime, cause: impl Into<String>) -> Self {
        Self {
            online,
            changed_at,
            cause: cause.into(),
        }
    }

    /// True for the first event of a stream, which reports the state found
    /// at startup rather than a transition.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.cause.starts_with("initial: ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_events_are_recognized() {
        let now = SystemTime::now();
        assert!(OnlineEvent::new(true, now, "initial: default via eth0").is_initial());
        assert!(!OnlineEvent::new(false, now, "link change; default iface down").is_initial());
    }

    #[test]
    fn serializes_round_trip() {
        let event = OnlineEvent::new(true, SystemTime::UNIX_EPOCH, "initial: default via eth0");
        let json = serde_json::to_string(&event).unwrap();
        let back: OnlineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
