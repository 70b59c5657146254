//! Evaluation result type and evaluator abstraction.

use super::EvalError;

/// The result of one passive online evaluation.
///
/// `cause` names the first failing heuristic layer when offline, or the
/// default-route interface when online. It is diagnostic only; consumers
/// must not parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineSnapshot {
    /// Whether a plausible default path to the internet exists.
    pub online: bool,
    /// Why. Format-unstable.
    pub cause: String,
}

impl OnlineSnapshot {
    /// Creates an online snapshot.
    #[must_use]
    pub fn online(cause: impl Into<String>) -> Self {
        Self {
            online: true,
            cause: cause.into(),
        }
    }

    /// Creates an offline snapshot.
    #[must_use]
    pub fn offline(cause: impl Into<String>) -> Self {
        Self {
            online: false,
            cause: cause.into(),
        }
    }
}

/// Trait for platform online-state evaluators.
///
/// # Purity
///
/// An implementation reads current kernel state and nothing else; it holds
/// no cross-call memory. Repeated calls with no intervening kernel change
/// must return identical snapshots.
pub trait OnlineEvaluator: Send + Sync {
    /// Computes the current online state.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] when kernel state cannot be read (procfs,
    /// routing table queries, adapter APIs). A failed evaluation still maps
    /// to a best-effort offline snapshot via [`EvalError::failure_cause`].
    fn evaluate(&self) -> Result<OnlineSnapshot, EvalError>;
}
