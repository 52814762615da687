// crates/session/src/error.rs
use thiserror::Error;

/// Why a tracked session ended in [`crate::ViewState::Failed`].
///
/// Surfaced once through the terminal `Failed` event; the Display string
/// is what callers show to users. Stale-response discards are not errors
/// and never reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The consecutive transport-failure cap was hit while polling.
    #[error("connection error")]
    ConnectionLost,

    /// The backend reported `status: "error"` for the job itself.
    #[error("analysis failed: {0}")]
    JobFailed(String),

    /// The job finished, but the results endpoint would not yield the
    /// bundle within the failure budget.
    #[error("analysis finished but results could not be retrieved")]
    ResultsUnavailable,

    /// Historical resolution: both the results probe and the status
    /// probe failed, so liveness could not be inferred.
    #[error("could not determine analysis state")]
    Indeterminate,
}
