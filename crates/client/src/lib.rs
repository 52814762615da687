// crates/client/src/lib.rs
//! HTTP client for the GEO analysis backend.
//!
//! Pure I/O: each method maps to one backend endpoint and returns the
//! parsed body or a [`ClientError`]. Retry, cadence, and stale-response
//! policy all live in `geo-console-session` — never here.

mod backend;
mod error;
mod http;

pub use backend::AnalysisBackend;
pub use error::ClientError;
pub use http::HttpAnalysisClient;
