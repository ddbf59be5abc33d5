// src/services/synchronizer.rs
//
// Notification read-state synchronizer.
//
// ─ Sources ──────────────────────────────────────────────────────────────────
//
//   Scheduler ──tick──┐
//                     ├──> refresh() ──fetch_all──> PollSource
//   PushChannel ──────┘         │
//                               └─ reconcile with optimistic reads, commit
//
//   Presentation ──mark_read / mark_all_read──> flip locally, then persist
//
// ─ Rules ────────────────────────────────────────────────────────────────────
//
//   * At most one fetch is outstanding. A refresh requested while one is in
//     flight awaits the same shared future and observes its result.
//   * A successful fetch replaces the list wholesale. Ids marked read locally
//     since then stay read until the fetched data agrees.
//   * Mark operations never roll back: "read" only moves one way.
//   * Push events never edit the list; they only trigger a refresh.
//   * After teardown nothing is committed.
//
// ────────────────────────────────────────────────────────────────────────────

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::{counter, histogram};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use reel_shared::errors::TransportError;

use crate::alerts::{format_alert, Alert};
use crate::events::PushEvent;
use crate::models::{
    derive_unread_count, merge_by_id, ConnectionState, Notification, NotificationSnapshot,
};
use crate::services::poll_source::PollSource;

// ─── Outcomes and reports ───────────────────────────────────────────────────

/// Result of one (possibly shared) refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched list was committed.
    Committed { total: usize, unread: usize },
    /// The fetch failed; the previous list is still current.
    Failed(TransportError),
    /// The session was torn down; nothing was committed.
    Discarded,
}

impl RefreshOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "committed",
            Self::Failed(_) => "failed",
            Self::Discarded => "discarded",
        }
    }
}

/// Which operation a reported failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOperation {
    Refresh,
    MarkRead(String),
    MarkAllRead,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::MarkRead(_) => "mark_read",
            Self::MarkAllRead => "mark_all_read",
        }
    }
}

/// Non-fatal failure reported to the presentation layer.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub operation: SyncOperation,
    pub error: TransportError,
    pub at: DateTime<Utc>,
}

// ─── Session state ──────────────────────────────────────────────────────────

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Default)]
struct SessionState {
    notifications: Vec<Notification>,
    /// `Some` exactly while a fetch is outstanding.
    in_flight: Option<PendingRefresh>,
    connection: ConnectionState,
    has_seen_first_snapshot: bool,
    /// Ids flipped to read locally that the fetched data has not confirmed yet.
    optimistic_reads: HashSet<String>,
    torn_down: bool,
}

struct Inner {
    source: Arc<dyn PollSource>,
    state: Mutex<SessionState>,
    snapshot_tx: watch::Sender<NotificationSnapshot>,
    alert_tx: broadcast::Sender<Alert>,
    failure_tx: broadcast::Sender<SyncFailure>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // no invariant spans a panic point, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.snapshot_tx.send_replace(NotificationSnapshot::new(
            &state.notifications,
            state.connection,
            state.in_flight.is_some(),
        ));
    }

    fn report(&self, operation: SyncOperation, error: TransportError) {
        warn!(
            operation = operation.as_str(),
            code = error.error_code().code(),
            transient = error.error_code().is_transient(),
            error = %error,
            "notification sync operation failed"
        );
        counter!("notification_sync_failures_total", "operation" => operation.as_str())
            .increment(1);

        let _ = self.failure_tx.send(SyncFailure {
            operation,
            error,
            at: Utc::now(),
        });
    }

    fn emit_alert(&self, alert: Alert) {
        debug!(alert_id = %alert.id, severity = %alert.severity, "alert produced");
        counter!("notification_alerts_total", "severity" => alert.severity.as_str()).increment(1);
        // no subscriber simply means nothing is displayed
        let _ = self.alert_tx.send(alert);
    }

    /// Apply a finished fetch. Runs once per shared refresh.
    fn commit(&self, result: Result<Vec<Notification>, TransportError>) -> RefreshOutcome {
        let mut state = self.lock();
        if state.torn_down {
            debug!("session torn down, discarding refresh result");
            return RefreshOutcome::Discarded;
        }
        state.in_flight = None;

        match result {
            Ok(fetched) => {
                let mut list = merge_by_id(&state.notifications, fetched);
                reconcile(&mut list, &mut state.optimistic_reads);

                state.notifications = list;
                state.has_seen_first_snapshot = true;
                self.publish(&state);

                let total = state.notifications.len();
                let unread = derive_unread_count(&state.notifications);
                debug!(total, unread, "notifications refreshed");
                RefreshOutcome::Committed { total, unread }
            }
            Err(error) => {
                self.publish(&state);
                drop(state);

                self.report(SyncOperation::Refresh, error.clone());
                RefreshOutcome::Failed(error)
            }
        }
    }
}

/// Re-apply local reads to a fetched list before it becomes authoritative.
///
/// Ids the fetched data already shows as read, or no longer contains, are
/// forgotten so the set stays bounded by the list.
fn reconcile(list: &mut [Notification], optimistic_reads: &mut HashSet<String>) {
    if optimistic_reads.is_empty() {
        return;
    }

    let mut still_pending = HashSet::new();
    for record in list.iter_mut() {
        if !optimistic_reads.contains(&record.id) {
            continue;
        }
        if !record.read {
            record.read = true;
            still_pending.insert(record.id.clone());
        }
    }

    let forgotten = optimistic_reads.len() - still_pending.len();
    if forgotten > 0 {
        debug!(forgotten, pending = still_pending.len(), "optimistic reads confirmed");
    }
    *optimistic_reads = still_pending;
}

async fn run_refresh(inner: Arc<Inner>) -> RefreshOutcome {
    let started = Instant::now();
    let result = inner.source.fetch_all().await;
    histogram!("notification_refresh_duration_seconds").record(started.elapsed().as_secs_f64());

    let outcome = inner.commit(result);
    counter!("notification_refresh_total", "outcome" => outcome.label()).increment(1);
    outcome
}

// ─── Synchronizer ───────────────────────────────────────────────────────────

/// Owner of the authoritative notification list for one admin session.
///
/// Cheap to clone; every clone drives the same state. The presentation layer
/// reads it through [`snapshot`](Self::snapshot) / [`subscribe`](Self::subscribe)
/// and the alert and failure streams.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

impl Synchronizer {
    /// `channel_capacity` bounds the alert and failure broadcast buffers.
    pub fn new(source: Arc<dyn PollSource>, channel_capacity: usize) -> Self {
        let (snapshot_tx, _) = watch::channel(NotificationSnapshot::default());
        let (alert_tx, _) = broadcast::channel(channel_capacity.max(1));
        let (failure_tx, _) = broadcast::channel(channel_capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                source,
                state: Mutex::new(SessionState::default()),
                snapshot_tx,
                alert_tx,
                failure_tx,
            }),
        }
    }

    // ── Read model ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn alerts(&self) -> broadcast::Receiver<Alert> {
        self.inner.alert_tx.subscribe()
    }

    pub fn failures(&self) -> broadcast::Receiver<SyncFailure> {
        self.inner.failure_tx.subscribe()
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Fetch and commit the authoritative list, coalescing with any refresh
    /// already in flight. Never fails; see [`RefreshOutcome`].
    pub async fn refresh(&self) -> RefreshOutcome {
        match self.begin_refresh() {
            Some(pending) => pending.await,
            None => RefreshOutcome::Discarded,
        }
    }

    fn begin_refresh(&self) -> Option<PendingRefresh> {
        let mut state = self.inner.lock();
        if state.torn_down {
            return None;
        }

        if let Some(pending) = &state.in_flight {
            debug!("refresh already in flight, joining it");
            return Some(pending.clone());
        }

        let pending = run_refresh(self.inner.clone()).boxed().shared();
        state.in_flight = Some(pending.clone());
        self.inner.publish(&state);
        Some(pending)
    }

    /// Mark one notification read: locally at once, then upstream.
    ///
    /// Unknown or already-read ids are a no-op. An upstream failure is
    /// reported but the local flip is kept.
    pub async fn mark_read(&self, id: &str) {
        if !self.apply_mark_read(id) {
            return;
        }

        match self.inner.source.mark_one_read(id).await {
            Ok(()) => {
                counter!("notification_mark_read_total", "outcome" => "ok").increment(1);
                debug!(notification_id = %id, "notification marked read");
            }
            Err(error) => {
                counter!("notification_mark_read_total", "outcome" => "failed").increment(1);
                self.inner
                    .report(SyncOperation::MarkRead(id.to_string()), error);
            }
        }
    }

    fn apply_mark_read(&self, id: &str) -> bool {
        let mut state = self.inner.lock();
        if state.torn_down {
            return false;
        }

        let Some(record) = state.notifications.iter_mut().find(|n| n.id == id) else {
            debug!(notification_id = %id, "mark_read on unknown notification ignored");
            return false;
        };
        if record.read {
            return false;
        }

        record.read = true;
        state.optimistic_reads.insert(id.to_string());
        self.inner.publish(&state);
        true
    }

    /// Mark every notification read: locally at once, then upstream.
    ///
    /// The upstream call is made even when nothing is unread locally, since
    /// the server may hold unread records beyond the fetched page.
    pub async fn mark_all_read(&self) {
        if !self.apply_mark_all_read() {
            return;
        }

        match self.inner.source.mark_all_read().await {
            Ok(()) => {
                counter!("notification_mark_read_total", "outcome" => "ok").increment(1);
                debug!("all notifications marked read upstream");
                // a refresh may have committed unread records while the call was pending
                self.apply_mark_all_read();
            }
            Err(error) => {
                counter!("notification_mark_read_total", "outcome" => "failed").increment(1);
                self.inner.report(SyncOperation::MarkAllRead, error);
            }
        }
    }

    /// Flip every unread record locally. Returns false once torn down.
    fn apply_mark_all_read(&self) -> bool {
        let mut state = self.inner.lock();
        if state.torn_down {
            return false;
        }

        let SessionState {
            notifications,
            optimistic_reads,
            ..
        } = &mut *state;
        let mut flipped = 0usize;
        for record in notifications.iter_mut().filter(|n| !n.read) {
            record.read = true;
            optimistic_reads.insert(record.id.clone());
            flipped += 1;
        }

        if flipped > 0 {
            self.inner.publish(&state);
        }
        debug!(flipped, "mark_all_read applied locally");
        true
    }

    /// Handle one event from the push channel.
    ///
    /// Data events trigger a refresh (the handle is returned for callers that
    /// want to await it) and, once the first snapshot has been committed, an
    /// ephemeral alert. Liveness events only update the connection state.
    pub fn on_push_event(&self, event: PushEvent) -> Option<JoinHandle<RefreshOutcome>> {
        if let PushEvent::Connection { connected } = event {
            self.set_connected(connected);
            return None;
        }

        // Sampled on arrival: the refresh this event triggers must not count.
        let alerts_enabled = {
            let state = self.inner.lock();
            if state.torn_down {
                return None;
            }
            state.has_seen_first_snapshot
        };

        if alerts_enabled {
            if let Some(alert) = format_alert(&event) {
                self.inner.emit_alert(alert);
            }
        } else {
            debug!(kind = event.kind(), "no snapshot yet, alert suppressed");
        }

        let sync = self.clone();
        Some(tokio::spawn(async move { sync.refresh().await }))
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        let mut state = self.inner.lock();
        if state.torn_down || state.connection.connected == connected {
            return;
        }

        state.connection = ConnectionState { connected };
        self.inner.publish(&state);
        info!(connected, "push channel connection state changed");
    }

    /// Stop accepting work. A refresh already in flight may finish but its
    /// result is dropped. The final snapshot has no refresh in flight.
    pub fn tear_down(&self) {
        let mut state = self.inner.lock();
        if state.torn_down {
            return;
        }
        state.torn_down = true;
        // whoever is awaiting it keeps driving it; we only drop our handle
        state.in_flight = None;
        self.inner.publish(&state);
        info!("notification synchronizer torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.lock().torn_down
    }

    #[cfg(test)]
    pub(crate) fn pending_optimistic_reads(&self) -> usize {
        self.inner.lock().optimistic_reads.len()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
