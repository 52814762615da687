// crates/session/src/resolver.rs
//! Liveness inference for re-selected sessions.
//!
//! The caller has no persisted "is this still running" flag for a
//! session it merely re-selects, so liveness is inferred with a
//! two-step probe: results first (finished jobs answer immediately and
//! no polling ever starts), then status. A running status hands off to
//! the polling loop; anything else terminates with a reason that tells
//! the user whether the job failed, finished-but-unfetchable, or could
//! not be assessed at all.

use std::sync::Arc;

use geo_console_client::AnalysisBackend;
use geo_console_types::Lifecycle;

use crate::controller::{PollTag, Shared};
use crate::error::FailureReason;
use crate::poller;

pub(crate) async fn run<B: AnalysisBackend>(shared: Arc<Shared<B>>, tag: PollTag) {
    // Step 1: results probe. Success means the job completed some time
    // ago and we are done.
    match shared.backend.results(&tag.session).await {
        Ok(bundle) => {
            shared.complete(&tag, bundle);
            return;
        }
        Err(e) => {
            tracing::debug!(
                session = %tag.session,
                error = %e,
                "results probe failed; falling back to status probe"
            );
            if shared.record_failure(&tag).is_none() {
                return;
            }
        }
    }

    // Step 2: status probe.
    match shared.backend.status(&tag.session).await {
        Ok(snapshot) => {
            if !shared.accept_snapshot(&tag, &snapshot) {
                return;
            }
            match snapshot.lifecycle {
                Lifecycle::Running => {
                    // Still executing: resume live tracking. The status
                    // check we just did counts as the first poll.
                    if !shared.enter_polling(&tag) {
                        return;
                    }
                    tracing::info!(session = %tag.session, "historical session still running; polling");
                    if poller::pause(&shared, &tag).await {
                        poller::run(shared, tag).await;
                    }
                }
                Lifecycle::Completed => {
                    // Finished, but the results probe just failed. Retry
                    // retrieval under the normal failure budget.
                    fetch_results(&shared, &tag).await;
                }
                Lifecycle::Errored => {
                    let message = snapshot
                        .error
                        .unwrap_or_else(|| "analysis reported an error".to_string());
                    shared.fail(&tag, FailureReason::JobFailed(message));
                }
            }
        }
        Err(e) => {
            tracing::warn!(
                session = %tag.session,
                error = %e,
                "both liveness probes failed"
            );
            if shared.record_failure(&tag).is_none() {
                return;
            }
            shared.fail(&tag, FailureReason::Indeterminate);
        }
    }
}

/// Retrieve the result bundle for a session whose status already says
/// `completed`. Invoked from both the historical path and the polling
/// loop's completion step; retries at the poll cadence and gives up at
/// the consecutive-failure cap.
pub(crate) async fn fetch_results<B: AnalysisBackend>(shared: &Arc<Shared<B>>, tag: &PollTag) {
    loop {
        match shared.backend.results(&tag.session).await {
            Ok(bundle) => {
                shared.complete(tag, bundle);
                return;
            }
            Err(e) => {
                tracing::warn!(session = %tag.session, error = %e, "results fetch failed");
                match shared.record_failure(tag) {
                    None => return,
                    Some(n) if n >= shared.config.max_failures => {
                        shared.fail(tag, FailureReason::ResultsUnavailable);
                        return;
                    }
                    Some(_) => {}
                }
            }
        }

        if !poller::pause(shared, tag).await {
            return;
        }
    }
}
