// crates/session/src/poller.rs
//! Fixed-cadence status polling for one tagged session.
//!
//! The loop fetches immediately, then waits `PollConfig::interval`
//! between the end of one check and the start of the next. It stops on
//! a terminal status, on the consecutive-failure cap, or when its tag
//! is superseded. Supersession cancels the pending sleep through the
//! tag's token; a fetch already in flight is left to resolve and its
//! response is discarded by the epoch check.

use std::sync::Arc;

use geo_console_client::AnalysisBackend;
use geo_console_types::Lifecycle;

use crate::controller::{PollTag, Shared};
use crate::error::FailureReason;
use crate::resolver;

pub(crate) async fn run<B: AnalysisBackend>(shared: Arc<Shared<B>>, tag: PollTag) {
    loop {
        match shared.backend.status(&tag.session).await {
            Ok(snapshot) => {
                if !shared.accept_snapshot(&tag, &snapshot) {
                    return;
                }
                match snapshot.lifecycle {
                    Lifecycle::Running => {}
                    Lifecycle::Completed => {
                        // The job is done; the bundle retrieval is shared
                        // with the historical resolver.
                        resolver::fetch_results(&shared, &tag).await;
                        return;
                    }
                    Lifecycle::Errored => {
                        let message = snapshot
                            .error
                            .unwrap_or_else(|| "analysis reported an error".to_string());
                        shared.fail(&tag, FailureReason::JobFailed(message));
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(session = %tag.session, error = %e, "status poll failed");
                match shared.record_failure(&tag) {
                    None => return,
                    Some(n) if n >= shared.config.max_failures => {
                        shared.fail(&tag, FailureReason::ConnectionLost);
                        return;
                    }
                    Some(_) => {}
                }
            }
        }

        if !pause(&shared, &tag).await {
            return;
        }
    }
}

/// Wait one poll interval. Returns false when the session was superseded
/// — either the pending timer was cancelled outright or the tag went
/// stale while we slept.
pub(crate) async fn pause<B>(shared: &Arc<Shared<B>>, tag: &PollTag) -> bool {
    tokio::select! {
        _ = tag.cancel.cancelled() => false,
        _ = tokio::time::sleep(shared.config.interval) => shared.is_current(tag),
    }
}
