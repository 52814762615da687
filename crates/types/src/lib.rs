// crates/types/src/lib.rs
//! Wire and domain types shared across the geo-console workspace.
//!
//! Field names mirror what the analysis backend actually serves
//! (snake_case JSON). Unknown fields are ignored on deserialization so
//! backend additions never break the client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle identifying one analysis job on the backend.
///
/// The backend mints these (e.g. `apple_20241006_143000`); the client
/// never inspects the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Backend-reported lifecycle of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Running,
    Completed,
    #[serde(rename = "error")]
    Errored,
}

impl Lifecycle {
    /// Terminal lifecycles never transition again without a new run.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Lifecycle::Running)
    }
}

/// One point-in-time view of an analysis job, as returned by
/// `GET /api/analysis/status/{session_id}`.
///
/// Immutable once received; superseded by the next poll. The wire value
/// of `progress` is not guaranteed monotonic — display code should show
/// the most recently accepted snapshot, not the maximum seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(rename = "status")]
    pub lifecycle: Lifecycle,
    /// 0..=100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub current_step: String,
    /// Present when `lifecycle` is `Errored`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Completed analysis payload from `GET /api/results/{session_id}`.
///
/// The lifecycle controller only cares about presence or absence; the
/// shape belongs to the rendering layer.
pub type ResultBundle = serde_json::Value;

/// Request body for `POST /api/analysis/run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub brand_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    pub num_prompts: u32,
    pub selected_llms: Vec<String>,
    pub regenerate_prompts: bool,
}

impl AnalysisRequest {
    pub fn new(brand_name: impl Into<String>, selected_llms: Vec<String>) -> Self {
        Self {
            brand_name: brand_name.into(),
            product_name: None,
            website_url: None,
            num_prompts: 10,
            selected_llms,
            regenerate_prompts: false,
        }
    }

    pub fn with_product(mut self, product_name: impl Into<String>) -> Self {
        self.product_name = Some(product_name.into());
        self
    }

    pub fn with_website(mut self, website_url: impl Into<String>) -> Self {
        self.website_url = Some(website_url.into());
        self
    }

    pub fn with_num_prompts(mut self, num_prompts: u32) -> Self {
        self.num_prompts = num_prompts;
        self
    }
}

/// Response from `POST /api/analysis/run`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunStarted {
    pub session_id: SessionId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Response from `POST /api/reanalyze-with-same-prompts/{session_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReanalyzeStarted {
    pub new_session_id: SessionId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// One row from `GET /api/recent-analyses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentAnalysis {
    pub session_id: SessionId,
    pub brand_name: String,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Envelope from `GET /api/recent-analyses`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentAnalyses {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub analyses: Vec<RecentAnalysis>,
}
