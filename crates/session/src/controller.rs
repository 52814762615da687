// crates/session/src/controller.rs
//! Top-level session state machine.
//!
//! Owns the current session id and [`ViewState`], dispatches to the
//! polling loop and the historical resolver, and guarantees the
//! single-terminal-event contract. All mutation goes through one lock;
//! every background task carries a [`PollTag`] captured at issue time
//! and re-validates it before touching state, so the last explicitly
//! selected session always wins, no matter when older responses land.

use std::sync::{Arc, Mutex, MutexGuard};

use geo_console_client::{AnalysisBackend, ClientError};
use geo_console_types::{AnalysisRequest, Lifecycle, ResultBundle, SessionId, StatusSnapshot};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::cache::{InvalidateCache, NoopCache, STALE_AFTER_REANALYSIS};
use crate::error::FailureReason;
use crate::state::{PollConfig, SessionEvent, ViewState};
use crate::{poller, resolver};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tracks one analysis session at a time. Cheap to clone; all clones
/// share state. Operations that spawn background work (`start_new`,
/// `select_existing`) must be called from within a tokio runtime.
pub struct SessionController<B> {
    shared: Arc<Shared<B>>,
}

impl<B> Clone for SessionController<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: AnalysisBackend + 'static> SessionController<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, PollConfig::default())
    }

    pub fn with_config(backend: B, config: PollConfig) -> Self {
        Self::with_cache(backend, config, Arc::new(NoopCache))
    }

    /// `invalidator` is notified after a successful reanalysis mutation.
    pub fn with_cache(
        backend: B,
        config: PollConfig,
        invalidator: Arc<dyn InvalidateCache>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                backend,
                config,
                invalidator,
                events_tx,
                inner: Mutex::new(Inner::new()),
            }),
        }
    }

    /// Track a freshly created session and begin live polling.
    ///
    /// Calling this with the id already being polled is a no-op; any
    /// other id supersedes the previous session entirely.
    pub fn start_new(&self, id: SessionId) {
        let tag = {
            let mut inner = self.shared.lock();
            if inner.view == ViewState::Polling && inner.session.as_ref() == Some(&id) {
                tracing::debug!(session = %id, "already polling this session; start_new ignored");
                return;
            }
            inner.supersede();
            inner.session = Some(id.clone());
            inner.view = ViewState::Polling;
            inner.tag(id)
        };
        tracing::info!(session = %tag.session, "tracking new analysis session");
        tokio::spawn(poller::run(Arc::clone(&self.shared), tag));
    }

    /// Track a previously known session whose liveness is unknown.
    ///
    /// The optional `hint` is a display label (typically the brand name)
    /// and plays no part in liveness decisions.
    pub fn select_existing(&self, id: SessionId, hint: Option<String>) {
        let tag = {
            let mut inner = self.shared.lock();
            inner.supersede();
            inner.session = Some(id.clone());
            inner.brand_hint = hint;
            inner.view = ViewState::ResolvingHistorical;
            inner.tag(id)
        };
        tracing::info!(session = %tag.session, "resolving historical session");
        tokio::spawn(resolver::run(Arc::clone(&self.shared), tag));
    }

    /// Stop tracking. Cancels pending poll timers; any response already
    /// in flight is discarded by the tag check when it lands. Idempotent.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        inner.supersede();
        inner.session = None;
        inner.view = ViewState::Idle;
    }

    /// Create a new analysis job and start tracking it.
    ///
    /// The view shows `Submitting` while the creation call is in flight.
    /// A creation failure returns the error and drops back to `Idle`
    /// without emitting a terminal event — no session ever existed.
    pub async fn submit(&self, request: &AnalysisRequest) -> Result<SessionId, ClientError> {
        let epoch = self.begin_submission(Some(request.brand_name.clone()));
        match self.shared.backend.run_analysis(request).await {
            Ok(started) => {
                self.finish_submission(epoch, &started.session_id);
                Ok(started.session_id)
            }
            Err(e) => {
                self.abort_submission(epoch);
                Err(e)
            }
        }
    }

    /// Re-run a previous session with identical prompts and LLMs.
    ///
    /// On success the backend has already mutated history, so the cached
    /// read groups are invalidated unconditionally — even if a newer
    /// operation superseded this one while the call was in flight — and
    /// the new session is tracked unless superseded.
    pub async fn reanalyze(&self, id: &SessionId) -> Result<SessionId, ClientError> {
        let epoch = self.begin_submission(None);
        match self.shared.backend.reanalyze(id).await {
            Ok(started) => {
                for group in STALE_AFTER_REANALYSIS {
                    self.shared.invalidator.invalidate(group);
                }
                tracing::info!(
                    from = %id,
                    to = %started.new_session_id,
                    "reanalysis started; cached reads invalidated"
                );
                self.finish_submission(epoch, &started.new_session_id);
                Ok(started.new_session_id)
            }
            Err(e) => {
                self.abort_submission(epoch);
                Err(e)
            }
        }
    }

    fn begin_submission(&self, hint: Option<String>) -> u64 {
        let mut inner = self.shared.lock();
        inner.supersede();
        inner.session = None;
        inner.brand_hint = hint;
        inner.view = ViewState::Submitting;
        inner.epoch
    }

    /// Epoch check and takeover happen under one guard, so an operation
    /// landing while the creation call was in flight cannot be overridden
    /// by the older submission resolving.
    fn finish_submission(&self, epoch: u64, id: &SessionId) {
        let tag = {
            let mut inner = self.shared.lock();
            if inner.epoch != epoch {
                tracing::debug!(session = %id, "job creation resolved for a superseded submission");
                return;
            }
            inner.supersede();
            inner.session = Some(id.clone());
            inner.view = ViewState::Polling;
            inner.tag(id.clone())
        };
        tracing::info!(session = %tag.session, "tracking new analysis session");
        tokio::spawn(poller::run(Arc::clone(&self.shared), tag));
    }

    fn abort_submission(&self, epoch: u64) {
        let mut inner = self.shared.lock();
        if inner.epoch == epoch {
            inner.view = ViewState::Idle;
        }
    }

    // ── Observers ───────────────────────────────────────────────────────

    pub fn view(&self) -> ViewState {
        self.shared.lock().view
    }

    pub fn session(&self) -> Option<SessionId> {
        self.shared.lock().session.clone()
    }

    pub fn brand_hint(&self) -> Option<String> {
        self.shared.lock().brand_hint.clone()
    }

    /// The most recently accepted status snapshot — what a progress view
    /// should display, even if the wire value regressed.
    pub fn status(&self) -> Option<StatusSnapshot> {
        self.shared.lock().last_status.clone()
    }

    /// The retained result bundle, present iff the view is `Completed`.
    pub fn results(&self) -> Option<ResultBundle> {
        self.shared.lock().results.clone()
    }

    pub fn failure(&self) -> Option<FailureReason> {
        self.shared.lock().failure.clone()
    }

    /// Subscribe to progress and terminal events for whatever session is
    /// current at the time each event fires.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events_tx.subscribe()
    }
}

// ── Shared internals ────────────────────────────────────────────────────

pub(crate) struct Shared<B> {
    pub(crate) backend: B,
    pub(crate) config: PollConfig,
    invalidator: Arc<dyn InvalidateCache>,
    events_tx: broadcast::Sender<SessionEvent>,
    inner: Mutex<Inner>,
}

struct Inner {
    /// Bumped on every supersede; responses tagged with an older epoch
    /// are discarded at their mutation site.
    epoch: u64,
    session: Option<SessionId>,
    brand_hint: Option<String>,
    view: ViewState,
    last_status: Option<StatusSnapshot>,
    results: Option<ResultBundle>,
    failure: Option<FailureReason>,
    /// Consecutive transport failures for the current session.
    failures: u32,
    terminal_sent: bool,
    cancel: CancellationToken,
}

impl Inner {
    fn new() -> Self {
        Self {
            epoch: 0,
            session: None,
            brand_hint: None,
            view: ViewState::Idle,
            last_status: None,
            results: None,
            failure: None,
            failures: 0,
            terminal_sent: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Retire the current session: bump the epoch, cancel pending poll
    /// timers, and clear everything scoped to the old session.
    fn supersede(&mut self) {
        self.epoch += 1;
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.brand_hint = None;
        self.last_status = None;
        self.results = None;
        self.failure = None;
        self.failures = 0;
        self.terminal_sent = false;
    }

    fn tag(&self, session: SessionId) -> PollTag {
        PollTag {
            session,
            epoch: self.epoch,
            cancel: self.cancel.clone(),
        }
    }
}

/// Identity of one background task: which session it serves and which
/// epoch it was issued under. The token clears pending sleeps on
/// supersede; in-flight network calls are never aborted — their
/// responses fail the epoch check instead.
#[derive(Clone)]
pub(crate) struct PollTag {
    pub(crate) session: SessionId,
    pub(crate) epoch: u64,
    pub(crate) cancel: CancellationToken,
}

impl<B> Shared<B> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("controller state lock poisoned");
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn is_current(&self, tag: &PollTag) -> bool {
        self.lock().epoch == tag.epoch
    }

    /// Record a successful status fetch for `tag`'s session.
    /// Returns false (and changes nothing) when the tag is stale.
    pub(crate) fn accept_snapshot(&self, tag: &PollTag, snapshot: &StatusSnapshot) -> bool {
        let emit_progress = {
            let mut inner = self.lock();
            if inner.epoch != tag.epoch {
                tracing::debug!(session = %tag.session, "discarding stale status response");
                return false;
            }
            inner.failures = 0;
            inner.last_status = Some(snapshot.clone());
            snapshot.lifecycle == Lifecycle::Running
        };
        if emit_progress {
            let _ = self.events_tx.send(SessionEvent::Progress {
                session_id: tag.session.clone(),
                snapshot: snapshot.clone(),
            });
        }
        true
    }

    /// Count one transport failure. Returns the consecutive total, or
    /// None when the tag is stale (stale failures touch no counter).
    pub(crate) fn record_failure(&self, tag: &PollTag) -> Option<u32> {
        let mut inner = self.lock();
        if inner.epoch != tag.epoch {
            tracing::debug!(session = %tag.session, "discarding stale transport failure");
            return None;
        }
        inner.failures += 1;
        Some(inner.failures)
    }

    /// Historical resolver handoff into live polling.
    pub(crate) fn enter_polling(&self, tag: &PollTag) -> bool {
        let mut inner = self.lock();
        if inner.epoch != tag.epoch {
            return false;
        }
        inner.view = ViewState::Polling;
        true
    }

    pub(crate) fn complete(&self, tag: &PollTag, results: ResultBundle) {
        {
            let mut inner = self.lock();
            if inner.epoch != tag.epoch || inner.terminal_sent {
                tracing::debug!(session = %tag.session, "suppressing completion for superseded session");
                return;
            }
            inner.view = ViewState::Completed;
            inner.results = Some(results.clone());
            inner.terminal_sent = true;
        }
        tracing::info!(session = %tag.session, "analysis completed");
        let _ = self.events_tx.send(SessionEvent::Completed {
            session_id: tag.session.clone(),
            results,
        });
    }

    pub(crate) fn fail(&self, tag: &PollTag, reason: FailureReason) {
        {
            let mut inner = self.lock();
            if inner.epoch != tag.epoch || inner.terminal_sent {
                tracing::debug!(session = %tag.session, "suppressing failure for superseded session");
                return;
            }
            inner.view = ViewState::Failed;
            inner.failure = Some(reason.clone());
            inner.terminal_sent = true;
        }
        tracing::warn!(session = %tag.session, %reason, "analysis tracking failed");
        let _ = self.events_tx.send(SessionEvent::Failed {
            session_id: tag.session.clone(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use geo_console_types::{ReanalyzeStarted, RunStarted};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cache::ReadGroup;

    /// Minimal backend: jobs start instantly (or after `mutation_delay`),
    /// status is forever running, results never exist. Enough to exercise
    /// controller-level logic.
    struct StubBackend {
        fail_mutations: bool,
        mutation_delay: Option<Duration>,
    }

    #[async_trait]
    impl AnalysisBackend for StubBackend {
        async fn run_analysis(
            &self,
            request: &AnalysisRequest,
        ) -> Result<RunStarted, ClientError> {
            if let Some(delay) = self.mutation_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_mutations {
                return Err(ClientError::UnexpectedStatus {
                    endpoint: "analysis/run",
                    status: 500,
                });
            }
            Ok(RunStarted {
                session_id: SessionId::new(format!("{}_fresh", request.brand_name)),
                status: "started".into(),
                message: String::new(),
            })
        }

        async fn status(&self, _id: &SessionId) -> Result<StatusSnapshot, ClientError> {
            Ok(StatusSnapshot {
                lifecycle: Lifecycle::Running,
                progress: 10,
                current_step: "working".into(),
                error: None,
            })
        }

        async fn results(&self, _id: &SessionId) -> Result<ResultBundle, ClientError> {
            Err(ClientError::UnexpectedStatus {
                endpoint: "results",
                status: 404,
            })
        }

        async fn reanalyze(&self, id: &SessionId) -> Result<ReanalyzeStarted, ClientError> {
            if self.fail_mutations {
                return Err(ClientError::UnexpectedStatus {
                    endpoint: "reanalyze",
                    status: 500,
                });
            }
            Ok(ReanalyzeStarted {
                new_session_id: SessionId::new(format!("{id}_rerun")),
                status: "processing".into(),
                message: String::new(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingCache {
        invalidated: StdMutex<Vec<ReadGroup>>,
    }

    impl InvalidateCache for RecordingCache {
        fn invalidate(&self, group: ReadGroup) {
            self.invalidated.lock().unwrap().push(group);
        }
    }

    #[test]
    fn fresh_controller_is_idle() {
        let ctrl = SessionController::new(StubBackend {
            fail_mutations: false,
            mutation_delay: None,
        });
        assert_eq!(ctrl.view(), ViewState::Idle);
        assert_eq!(ctrl.session(), None);
        assert_eq!(ctrl.status(), None);
        assert_eq!(ctrl.results(), None);
        assert_eq!(ctrl.failure(), None);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let ctrl = SessionController::new(StubBackend {
            fail_mutations: false,
            mutation_delay: None,
        });
        ctrl.start_new(SessionId::new("s1"));
        assert_eq!(ctrl.view(), ViewState::Polling);

        ctrl.reset();
        assert_eq!(ctrl.view(), ViewState::Idle);
        assert_eq!(ctrl.session(), None);

        ctrl.reset();
        assert_eq!(ctrl.view(), ViewState::Idle);
        assert_eq!(ctrl.session(), None);
    }

    #[tokio::test]
    async fn select_existing_records_hint_until_superseded() {
        let ctrl = SessionController::new(StubBackend {
            fail_mutations: false,
            mutation_delay: None,
        });
        ctrl.select_existing(SessionId::new("s1"), Some("Apple".into()));
        assert_eq!(ctrl.view(), ViewState::ResolvingHistorical);
        assert_eq!(ctrl.brand_hint().as_deref(), Some("Apple"));

        ctrl.reset();
        assert_eq!(ctrl.brand_hint(), None);
    }

    #[tokio::test]
    async fn submit_tracks_the_created_session() {
        let ctrl = SessionController::new(StubBackend {
            fail_mutations: false,
            mutation_delay: None,
        });
        let request = AnalysisRequest::new("Apple", vec!["Claude".into()]);
        let id = ctrl.submit(&request).await.unwrap();
        assert_eq!(id.as_str(), "Apple_fresh");
        assert_eq!(ctrl.view(), ViewState::Polling);
        assert_eq!(ctrl.session(), Some(id));
    }

    #[tokio::test]
    async fn failed_submission_returns_to_idle_without_terminal_event() {
        let ctrl = SessionController::new(StubBackend {
            fail_mutations: true,
            mutation_delay: None,
        });
        let mut rx = ctrl.subscribe();

        let request = AnalysisRequest::new("Apple", vec!["Claude".into()]);
        let err = ctrl.submit(&request).await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedStatus { status: 500, .. }));
        assert_eq!(ctrl.view(), ViewState::Idle);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_inflight_submission_wins() {
        let ctrl = SessionController::new(StubBackend {
            fail_mutations: false,
            mutation_delay: Some(Duration::from_secs(5)),
        });
        let submitter = ctrl.clone();
        let submission = tokio::spawn(async move {
            let request = AnalysisRequest::new("Apple", vec!["Claude".into()]);
            submitter.submit(&request).await
        });
        tokio::task::yield_now().await;
        assert_eq!(ctrl.view(), ViewState::Submitting);

        ctrl.reset();

        // The creation call still succeeds, but it resolved for a
        // superseded submission and must not take the session back over.
        let id = submission.await.unwrap().unwrap();
        assert_eq!(id.as_str(), "Apple_fresh");
        assert_eq!(ctrl.view(), ViewState::Idle);
        assert_eq!(ctrl.session(), None);
    }

    #[tokio::test]
    async fn reanalysis_invalidates_all_read_groups() {
        let cache = Arc::new(RecordingCache::default());
        let ctrl = SessionController::with_cache(
            StubBackend {
                fail_mutations: false,
                mutation_delay: None,
            },
            PollConfig::default(),
            Arc::clone(&cache) as Arc<dyn InvalidateCache>,
        );

        let new_id = ctrl.reanalyze(&SessionId::new("apple_old")).await.unwrap();
        assert_eq!(new_id.as_str(), "apple_old_rerun");
        assert_eq!(ctrl.view(), ViewState::Polling);

        let invalidated = cache.invalidated.lock().unwrap().clone();
        assert_eq!(invalidated, STALE_AFTER_REANALYSIS.to_vec());
    }

    #[tokio::test]
    async fn failed_reanalysis_touches_no_cache_group() {
        let cache = Arc::new(RecordingCache::default());
        let ctrl = SessionController::with_cache(
            StubBackend {
                fail_mutations: true,
                mutation_delay: None,
            },
            PollConfig::default(),
            Arc::clone(&cache) as Arc<dyn InvalidateCache>,
        );

        let err = ctrl.reanalyze(&SessionId::new("apple_old")).await;
        assert!(err.is_err());
        assert_eq!(ctrl.view(), ViewState::Idle);
        assert!(cache.invalidated.lock().unwrap().is_empty());
    }
}
