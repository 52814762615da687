// crates/session/src/state.rs
//! View state, controller events, and polling configuration.

use std::time::Duration;

use geo_console_types::{ResultBundle, SessionId, StatusSnapshot};

use crate::error::FailureReason;

/// What the caller should be showing right now. Exactly one is current
/// at any instant; every transition is a function of (state, event), not
/// of independent boolean flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// No session tracked.
    Idle,
    /// A job-creation call (run or reanalyze) is in flight.
    Submitting,
    /// Live status polling is running for the current session.
    Polling,
    /// Liveness of a re-selected session is being inferred.
    ResolvingHistorical,
    /// Terminal: the result bundle has been retrieved and retained.
    Completed,
    /// Terminal: see [`crate::SessionController::failure`] for the reason.
    Failed,
}

impl ViewState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ViewState::Completed | ViewState::Failed)
    }
}

/// Broadcast to subscribers as the tracked session evolves.
///
/// `Completed` and `Failed` are terminal: at most one of them is emitted
/// per session lifetime, and never for a superseded session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Progress {
        session_id: SessionId,
        snapshot: StatusSnapshot,
    },
    Completed {
        session_id: SessionId,
        results: ResultBundle,
    },
    Failed {
        session_id: SessionId,
        reason: FailureReason,
    },
}

/// Polling cadence and failure budget.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Delay between the end of one status check and the start of the
    /// next. No backoff.
    pub interval: Duration,
    /// Consecutive transport failures tolerated before giving up on the
    /// session. The counter resets on any successful call.
    pub max_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_failures: 3,
        }
    }
}
