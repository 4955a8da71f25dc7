//! Analyzer error types
//!
//! Only genuinely exceptional conditions are errors. An unresolvable module
//! or name is expected in an incremental engine and is modeled as `None` /
//! "no contribution yet", retried on a later pass, never as an error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// The state's snapshot could not be obtained because the module was
    /// torn down. Transient from a rule's point of view: skip this pass.
    #[error("analysis state for `{moniker}` is no longer available")]
    StateUnavailable { moniker: String },

    /// The fixpoint loop exceeded its iteration safety cap. Escalated to
    /// the coordinator as a diagnostic; the module is suspended until the
    /// next edit re-seeds it.
    #[error("analysis of `{moniker}` did not converge after {passes} passes")]
    NonConvergence { moniker: String, passes: usize },

    /// Cooperative cancellation was observed. Propagates up without
    /// mutating state and is not logged as an error.
    #[error("analysis was cancelled")]
    Cancelled,
}

impl AnalysisError {
    pub fn state_unavailable(moniker: impl Into<String>) -> Self {
        Self::StateUnavailable {
            moniker: moniker.into(),
        }
    }

    pub fn non_convergence(moniker: impl Into<String>, passes: usize) -> Self {
        Self::NonConvergence {
            moniker: moniker.into(),
            passes,
        }
    }

    /// True for conditions a rule or driver absorbs as "no change this pass"
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StateUnavailable { .. })
    }
}
