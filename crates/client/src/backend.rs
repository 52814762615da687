// crates/client/src/backend.rs
use async_trait::async_trait;
use geo_console_types::{
    AnalysisRequest, ReanalyzeStarted, ResultBundle, RunStarted, SessionId, StatusSnapshot,
};

use crate::error::ClientError;

/// The four backend operations the session controller depends on.
///
/// [`crate::HttpAnalysisClient`] is the production implementation; tests
/// substitute scripted mocks to drive the controller deterministically.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// `POST /api/analysis/run` — start a brand-new analysis job.
    async fn run_analysis(&self, request: &AnalysisRequest) -> Result<RunStarted, ClientError>;

    /// `GET /api/analysis/status/{session_id}` — current job progress.
    async fn status(&self, id: &SessionId) -> Result<StatusSnapshot, ClientError>;

    /// `GET /api/results/{session_id}` — completed analysis payload.
    /// Any error means "not ready or not found"; callers decide what that
    /// implies about liveness.
    async fn results(&self, id: &SessionId) -> Result<ResultBundle, ClientError>;

    /// `POST /api/reanalyze-with-same-prompts/{session_id}` — start a new
    /// job reusing a previous session's prompts and LLM selection.
    async fn reanalyze(&self, id: &SessionId) -> Result<ReanalyzeStarted, ClientError>;
}
