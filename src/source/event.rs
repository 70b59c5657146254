//! Change token types emitted by OS event sources.

use std::fmt;

/// What kind of kernel object changed, as far as the source can tell.
///
/// The tag is diagnostic only: every variant triggers the same re-evaluation
/// downstream. Sources that cannot classify (the BSD routing socket) use
/// [`ChangeReason::Net`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    /// A route was added or removed.
    Route,
    /// An interface address was added or removed.
    Address,
    /// An interface went up or down.
    Link,
    /// An IP interface parameter changed (Windows IP Helper).
    IpInterface,
    /// Unclassified network change.
    Net,
}

impl ChangeReason {
    /// Human-readable tag used in event cause strings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Route => "route change",
            Self::Address => "addr change",
            Self::Link => "link change",
            Self::IpInterface => "ip interface change",
            Self::Net => "net change",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An opaque "something changed" token from the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsEvent {
    /// Why the kernel woke us up.
    pub reason: ChangeReason,
}

impl OsEvent {
    /// Creates a token with the given reason.
    #[must_use]
    pub const fn new(reason: ChangeReason) -> Self {
        Self { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(ChangeReason::Route.label(), "route change");
        assert_eq!(ChangeReason::Address.label(), "addr change");
        assert_eq!(ChangeReason::Link.label(), "link change");
        assert_eq!(ChangeReason::IpInterface.label(), "ip interface change");
        assert_eq!(ChangeReason::Net.label(), "net change");
    }

    #[test]
    fn display_matches_label() {
        assert_eq!(ChangeReason::Link.to_string(), "link change");
    }
}
