//! The collaboration session: capture, periodic exchange, remote merge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use tessera_core::{SharedModel, SubscriptionId, SyncSettings};

use crate::capture::now_millis;
use crate::{
    merge_remote, CaptureHook, MergeReport, OutboundQueue, SyncError, SyncRequest, SyncTransport,
    UserRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.interval_ms.max(1)),
            request_timeout: Duration::from_millis(settings.request_timeout_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub active: bool,
    pub pending_count: usize,
    pub last_sync_time: Option<i64>,
    pub active_users: Vec<UserRef>,
    /// Reported only. Ticks keep their fixed period whatever this says.
    pub consecutive_failures: u32,
}

#[derive(Default)]
struct Session {
    token: String,
    user_id: String,
    /// Bumped on every start so a loop or response from an earlier session can tell it is stale.
    generation: u64,
    last_sync: Option<i64>,
    active_users: Vec<UserRef>,
    consecutive_failures: u32,
    subscription: Option<SubscriptionId>,
    cancel: Option<CancellationToken>,
}

struct Inner<T> {
    model: SharedModel,
    transport: T,
    config: SyncConfig,
    queue: OutboundQueue,
    active: Arc<AtomicBool>,
    session: Mutex<Session>,
}

/// Keeps a shared diagram in step with a remote session by polling.
///
/// Lock order: the model lock may be held while the capture hook takes the queue lock. The
/// session lock is never held while taking either of the others.
pub struct CollaborationSync<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CollaborationSync<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: SyncTransport> CollaborationSync<T> {
    pub fn new(model: SharedModel, transport: T, config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                model,
                transport,
                config,
                queue: OutboundQueue::new(),
                active: Arc::new(AtomicBool::new(false)),
                session: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.inner.queue
    }

    pub fn config(&self) -> SyncConfig {
        self.inner.config
    }

    /// Begin capturing local mutations and spawn the tick loop on the current tokio runtime.
    pub fn start(&self, session_token: &str, user_id: &str) -> Result<(), SyncError> {
        let token = session_token.trim();
        if token.is_empty() {
            return Err(SyncError::MissingSessionToken);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let cancel = CancellationToken::new();

        let generation = {
            let mut session = self.inner.session();
            if self.is_active() {
                return Err(SyncError::AlreadyActive);
            }
            session.generation += 1;
            session.token = token.to_string();
            session.user_id = user_id.to_string();
            session.last_sync = None;
            session.active_users.clear();
            session.consecutive_failures = 0;
            session.cancel = Some(cancel.clone());
            self.inner.queue.clear();
            self.inner.active.store(true, Ordering::Release);
            session.generation
        };

        let hook = CaptureHook::new(self.inner.queue.clone(), user_id, self.inner.active.clone());
        let subscription = self.inner.model.with(|m| m.subscribe(move |e| hook.observe(e)));
        self.inner.session().subscription = Some(subscription);

        runtime.spawn(run_loop(self.inner.clone(), cancel, generation));
        info!(user = user_id, interval_ms = self.inner.config.interval.as_millis() as u64; "collaboration started");
        Ok(())
    }

    /// Stop capturing and cancel the loop. A request already in flight completes; its response
    /// is dropped.
    pub fn stop(&self) {
        let (cancel, subscription) = {
            let mut session = self.inner.session();
            if !self.inner.active.swap(false, Ordering::AcqRel) {
                return;
            }
            (session.cancel.take(), session.subscription.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(id) = subscription {
            self.inner.model.with(|m| m.unsubscribe(id));
        }
        info!(pending = self.inner.queue.len(); "collaboration stopped");
    }

    /// Run one exchange now instead of waiting for the next tick.
    pub async fn sync_now(&self) -> Result<MergeReport, SyncError> {
        let generation = {
            let session = self.inner.session();
            if !self.is_active() {
                return Err(SyncError::NotActive);
            }
            session.generation
        };
        self.inner.tick(generation).await
    }

    pub fn status(&self) -> ConnectionStatus {
        let session = self.inner.session();
        ConnectionStatus {
            active: self.is_active(),
            pending_count: self.inner.queue.len(),
            last_sync_time: session.last_sync,
            active_users: session.active_users.clone(),
            consecutive_failures: session.consecutive_failures,
        }
    }
}

impl<T: SyncTransport> Inner<T> {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, session: &Session, generation: u64) -> bool {
        self.active.load(Ordering::Acquire) && session.generation == generation
    }

    async fn tick(&self, generation: u64) -> Result<MergeReport, SyncError> {
        let (token, user_id, last_sync) = {
            let session = self.session();
            if !self.is_current(&session, generation) {
                return Err(SyncError::NotActive);
            }
            (session.token.clone(), session.user_id.clone(), session.last_sync)
        };

        let request = SyncRequest { changes: self.queue.take_all(), last_sync };
        let sent = request.changes.len();
        let timeout = self.config.request_timeout;
        let result = match time::timeout(timeout, self.transport.exchange(&token, &request)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(timeout.as_millis() as u64)),
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let failures = {
                    let mut session = self.session();
                    if session.generation != generation {
                        return Err(err);
                    }
                    session.consecutive_failures += 1;
                    session.consecutive_failures
                };
                self.queue.restore_front(request.changes);
                warn!(error = err.to_string(), restored = sent, failures = failures; "sync tick failed");
                return Err(err);
            }
        };

        if !self.is_current(&self.session(), generation) {
            debug!(received = response.changes.len(); "discarding sync response after stop");
            return Ok(MergeReport::default());
        }

        let report = self.model.with(|m| merge_remote(&response.changes, &user_id, m));
        {
            let mut session = self.session();
            if session.generation == generation {
                session.last_sync = Some(response.server_time.unwrap_or_else(now_millis));
                session.active_users = response.active_users;
                session.consecutive_failures = 0;
            }
        }
        debug!(sent = sent, received = response.changes.len(), applied = report.applied; "sync tick");
        Ok(report)
    }
}

async fn run_loop<T: SyncTransport>(inner: Arc<Inner<T>>, cancel: CancellationToken, generation: u64) {
    let mut ticker = time::interval(inner.config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // Cancellation is only observed between ticks.
        if let Err(SyncError::NotActive) = inner.tick(generation).await {
            break;
        }
    }
    debug!(generation = generation; "sync loop finished");
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    use tessera_core::{DiagramElement, DiagramModel, ElementKind, FieldUpdate, Position, UmlData};

    use super::*;
    use crate::{EventKind, MutationLogEntry, SyncResponse};

    type Hook = Box<dyn FnOnce() + Send>;

    #[derive(Default)]
    struct Script {
        responses: Mutex<VecDeque<Result<SyncResponse, SyncError>>>,
        requests: Mutex<Vec<SyncRequest>>,
        during: Mutex<Option<Hook>>,
        gate: Option<Arc<Notify>>,
    }

    #[derive(Clone, Default)]
    struct ScriptedTransport(Arc<Script>);

    impl ScriptedTransport {
        fn gated(gate: Arc<Notify>) -> Self {
            Self(Arc::new(Script { gate: Some(gate), ..Default::default() }))
        }

        fn respond(&self, response: Result<SyncResponse, SyncError>) {
            self.0.responses.lock().unwrap().push_back(response);
        }

        fn during_next(&self, hook: impl FnOnce() + Send + 'static) {
            *self.0.during.lock().unwrap() = Some(Box::new(hook));
        }

        fn requests(&self) -> Vec<SyncRequest> {
            self.0.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SyncTransport for ScriptedTransport {
        async fn exchange(&self, _token: &str, request: &SyncRequest) -> Result<SyncResponse, SyncError> {
            self.0.requests.lock().unwrap().push(request.clone());
            let hook = self.0.during.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
            if let Some(gate) = &self.0.gate {
                gate.notified().await;
            }
            let next = self.0.responses.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(SyncResponse::default()))
        }
    }

    fn model() -> SharedModel {
        let mut model = DiagramModel::new();
        model
            .add_element(DiagramElement::new("a", ElementKind::Class, UmlData::named("Order"), Position::new(100.0, 100.0)))
            .unwrap();
        SharedModel::new(model)
    }

    fn move_to(model: &SharedModel, x: f64) {
        model
            .with(|m| m.set_field("a", FieldUpdate::Position(Position::new(x, 0.0))))
            .unwrap();
    }

    fn xs(entries: &[MutationLogEntry]) -> Vec<f64> {
        entries.iter().map(|e| e.data["x"].as_f64().unwrap()).collect()
    }

    fn remote_move(user: &str, x: f64) -> MutationLogEntry {
        MutationLogEntry {
            event: EventKind::ChangePosition,
            element_id: "a".into(),
            data: json!({"x": x, "y": 0.0}),
            timestamp: 1,
            user_id: user.into(),
        }
    }

    fn manual() -> SyncConfig {
        SyncConfig { interval: Duration::from_secs(3600), request_timeout: Duration::from_secs(10) }
    }

    #[test]
    fn start_needs_a_token_and_a_runtime() {
        let sync = CollaborationSync::new(model(), ScriptedTransport::default(), SyncConfig::default());
        assert!(matches!(sync.start("  ", "me"), Err(SyncError::MissingSessionToken)));
        assert!(matches!(sync.start("tok", "me"), Err(SyncError::NoRuntime)));
        assert!(!sync.is_active());
    }

    #[tokio::test]
    async fn start_twice_is_rejected_and_stop_detaches_capture() {
        let model = model();
        let sync = CollaborationSync::new(model.clone(), ScriptedTransport::default(), manual());
        sync.start("tok", "me").unwrap();
        assert!(matches!(sync.start("tok", "me"), Err(SyncError::AlreadyActive)));

        move_to(&model, 1.0);
        assert_eq!(sync.status().pending_count, 1);
        sync.stop();
        move_to(&model, 2.0);
        assert_eq!(sync.status().pending_count, 1);
        assert!(matches!(sync.sync_now().await, Err(SyncError::NotActive)));

        sync.start("tok", "me").unwrap();
        assert_eq!(sync.status().pending_count, 0);
        sync.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_send_the_queue_every_interval() {
        let model = model();
        let transport = ScriptedTransport::default();
        transport.respond(Ok(SyncResponse {
            server_time: Some(42),
            active_users: vec![UserRef { user_id: "u2".into(), name: Some("Ana".into()) }],
            ..Default::default()
        }));
        let sync = CollaborationSync::new(model.clone(), transport.clone(), SyncConfig::default());
        sync.start("tok", "me").unwrap();

        move_to(&model, 5.0);
        time::sleep(Duration::from_millis(100)).await;
        assert!(transport.requests().is_empty());

        time::sleep(Duration::from_millis(3_000)).await;
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(xs(&requests[0].changes), [5.0]);
        assert_eq!(requests[0].changes[0].user_id, "me");
        assert_eq!(requests[0].last_sync, None);

        let status = sync.status();
        assert_eq!(status.pending_count, 0);
        assert_eq!(status.last_sync_time, Some(42));
        assert_eq!(status.active_users.len(), 1);

        time::sleep(Duration::from_millis(3_000)).await;
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].changes.is_empty());
        assert_eq!(requests[1].last_sync, Some(42));

        sync.stop();
        time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn merging_never_refills_the_queue() {
        let model = model();
        let transport = ScriptedTransport::default();
        let sync = CollaborationSync::new(model.clone(), transport.clone(), manual());
        sync.start("tok", "me").unwrap();
        move_to(&model, 1.0);
        move_to(&model, 2.0);

        let echoes: Vec<_> = (0..100).map(|i| remote_move("me", i as f64)).collect();
        model.with(|m| merge_remote(&echoes, "me", m));
        assert_eq!(sync.queue().len(), 2);

        let mut changes = echoes;
        changes.push(remote_move("them", 77.0));
        transport.respond(Ok(SyncResponse { server_time: Some(1), changes, active_users: vec![] }));
        let report = sync.sync_now().await.unwrap();

        assert_eq!((report.echoes, report.applied), (100, 1));
        assert_eq!(sync.queue().len(), 0);
        assert_eq!(model.with(|m| m.element("a").unwrap().position.x), 77.0);
        sync.stop();
    }

    #[tokio::test]
    async fn edits_during_a_request_go_out_next_tick() {
        let model = model();
        let transport = ScriptedTransport::default();
        let sync = CollaborationSync::new(model.clone(), transport.clone(), manual());
        sync.start("tok", "me").unwrap();
        move_to(&model, 1.0);

        let during = model.clone();
        transport.during_next(move || move_to(&during, 2.0));
        sync.sync_now().await.unwrap();
        assert_eq!(sync.queue().len(), 1);

        sync.sync_now().await.unwrap();
        let requests = transport.requests();
        assert_eq!(xs(&requests[0].changes), [1.0]);
        assert_eq!(xs(&requests[1].changes), [2.0]);
        sync.stop();
    }

    #[tokio::test]
    async fn failed_batches_are_restored_in_order() {
        let model = model();
        let transport = ScriptedTransport::default();
        transport.respond(Err(SyncError::Status(503)));
        let sync = CollaborationSync::new(model.clone(), transport.clone(), manual());
        sync.start("tok", "me").unwrap();
        move_to(&model, 1.0);
        move_to(&model, 2.0);

        let during = model.clone();
        transport.during_next(move || move_to(&during, 3.0));
        assert!(matches!(sync.sync_now().await, Err(SyncError::Status(503))));
        assert_eq!(xs(&sync.queue().snapshot()), [1.0, 2.0, 3.0]);
        assert_eq!(sync.status().consecutive_failures, 1);
        assert_eq!(sync.status().last_sync_time, None);

        sync.sync_now().await.unwrap();
        assert_eq!(xs(&transport.requests()[1].changes), [1.0, 2.0, 3.0]);
        assert_eq!(sync.status().consecutive_failures, 0);
        sync.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_time_out_and_keep_the_batch() {
        let model = model();
        let transport = ScriptedTransport::gated(Arc::new(Notify::new()));
        let sync = CollaborationSync::new(model.clone(), transport, manual());
        sync.start("tok", "me").unwrap();
        move_to(&model, 1.0);

        assert!(matches!(sync.sync_now().await, Err(SyncError::Timeout(10_000))));
        assert_eq!(sync.queue().len(), 1);
        sync.stop();
    }

    #[tokio::test]
    async fn responses_arriving_after_stop_are_dropped() {
        let model = model();
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport::gated(gate.clone());
        transport.respond(Ok(SyncResponse {
            server_time: Some(9),
            changes: vec![remote_move("them", 500.0)],
            active_users: vec![],
        }));
        let sync = CollaborationSync::new(model.clone(), transport.clone(), manual());
        sync.start("tok", "me").unwrap();

        let in_flight = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.sync_now().await })
        };
        while transport.requests().is_empty() {
            tokio::task::yield_now().await;
        }
        sync.stop();
        gate.notify_one();

        let report = in_flight.await.unwrap().unwrap();
        assert_eq!(report, MergeReport::default());
        assert_eq!(model.with(|m| m.element("a").unwrap().position.x), 100.0);
        assert_eq!(sync.status().last_sync_time, None);
    }
}
