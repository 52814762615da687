// crates/client/src/http.rs
//! reqwest-backed implementation of [`AnalysisBackend`] plus the read
//! endpoints (recent analyses, brand history) the dashboard commands use.

use std::time::Duration;

use async_trait::async_trait;
use geo_console_types::{
    AnalysisRequest, ReanalyzeStarted, RecentAnalyses, ResultBundle, RunStarted, SessionId,
    StatusSnapshot,
};
use serde::de::DeserializeOwned;

use crate::backend::AnalysisBackend;
use crate::error::ClientError;

/// Per-request ceiling; the transport's own failure is what the
/// controller's retry cap actually budgets for.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin fetch wrapper over the analysis backend's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpAnalysisClient {
    /// `base_url` is the backend origin, e.g. `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/recent-analyses` — the ten most recent sessions.
    pub async fn recent_analyses(&self) -> Result<RecentAnalyses, ClientError> {
        let url = format!("{}/api/recent-analyses", self.base_url);
        self.get_json("recent-analyses", &url).await
    }

    /// `GET /api/brand-history/{brand}` — visibility history across
    /// analysis dates. Opaque to the client; rendered as-is.
    pub async fn brand_history(&self, brand: &str) -> Result<serde_json::Value, ClientError> {
        let url = format!("{}/api/brand-history/{}", self.base_url, brand);
        self.get_json("brand-history", &url).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(endpoint, status = status.as_u16(), "non-2xx from backend");
            return Err(ClientError::UnexpectedStatus {
                endpoint,
                status: status.as_u16(),
            });
        }

        resp.json::<T>().await.map_err(|e| ClientError::MalformedBody {
            endpoint,
            message: e.to_string(),
        })
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
        body: Option<&AnalysisRequest>,
    ) -> Result<T, ClientError> {
        let mut req = self.http.post(url).timeout(REQUEST_TIMEOUT);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(endpoint, status = status.as_u16(), "non-2xx from backend");
            return Err(ClientError::UnexpectedStatus {
                endpoint,
                status: status.as_u16(),
            });
        }

        resp.json::<T>().await.map_err(|e| ClientError::MalformedBody {
            endpoint,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisClient {
    async fn run_analysis(&self, request: &AnalysisRequest) -> Result<RunStarted, ClientError> {
        let url = format!("{}/api/analysis/run", self.base_url);
        self.post_json("analysis/run", &url, Some(request)).await
    }

    async fn status(&self, id: &SessionId) -> Result<StatusSnapshot, ClientError> {
        let url = format!("{}/api/analysis/status/{}", self.base_url, id);
        self.get_json("status", &url).await
    }

    async fn results(&self, id: &SessionId) -> Result<ResultBundle, ClientError> {
        let url = format!("{}/api/results/{}", self.base_url, id);
        self.get_json("results", &url).await
    }

    async fn reanalyze(&self, id: &SessionId) -> Result<ReanalyzeStarted, ClientError> {
        let url = format!("{}/api/reanalyze-with-same-prompts/{}", self.base_url, id);
        self.post_json::<ReanalyzeStarted>("reanalyze", &url, None)
            .await
    }
}
