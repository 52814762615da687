// crates/client/src/error.rs
use thiserror::Error;

/// Failure of a single backend call.
///
/// Every variant is transport-class from the controller's point of view:
/// the call did not yield a well-formed 2xx body. The controller counts
/// them against its consecutive-failure cap without distinguishing
/// further.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}")]
    UnexpectedStatus { endpoint: &'static str, status: u16 },

    #[error("malformed body from {endpoint}: {message}")]
    MalformedBody {
        endpoint: &'static str,
        message: String,
    },
}

impl ClientError {
    /// True when the backend answered with a definite 404 — the resource
    /// does not exist (as opposed to a flaky transport).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::UnexpectedStatus { status: 404, .. })
    }
}
