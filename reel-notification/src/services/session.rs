use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::SyncConfig;
use crate::events::subscriber::listen_push_events;
use crate::events::PushChannel;
use crate::services::poll_source::PollSource;
use crate::services::scheduler::Scheduler;
use crate::services::synchronizer::Synchronizer;

/// One admin session: a synchronizer wired to its scheduler and push listener.
pub struct NotificationSession {
    sync: Synchronizer,
    scheduler: Scheduler,
    listener_stop: watch::Sender<bool>,
}

impl NotificationSession {
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &SyncConfig,
        source: Arc<dyn PollSource>,
        push: Arc<dyn PushChannel>,
    ) -> Self {
        let sync = Synchronizer::new(source, config.alert_buffer);
        sync.set_connected(push.is_connected());

        // subscribe before the first refresh so no event slips between them
        let events = push.events();
        let (listener_stop, stop_rx) = watch::channel(false);
        tokio::spawn(listen_push_events(sync.clone(), events, stop_rx));

        let scheduler = Scheduler::spawn(sync.clone(), config.refresh_interval());

        info!(
            refresh_interval_secs = config.refresh_interval_secs,
            "notification session started"
        );

        Self {
            sync,
            scheduler,
            listener_stop,
        }
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    /// Tear down the session. Background tasks exit on their own; an
    /// in-flight refresh is discarded.
    pub fn shutdown(self) {
        // the rest happens in Drop
        info!("notification session shutting down");
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        self.sync.tear_down();
        self.scheduler.stop();
        self.listener_stop.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Severity;
    use crate::events::{BroadcastPushChannel, PushEvent};
    use crate::services::synchronizer::RefreshOutcome;
    use crate::testing::{notification, settle, FakePollSource};
    use serde_json::json;

    fn start(source: &Arc<FakePollSource>, push: &BroadcastPushChannel) -> NotificationSession {
        NotificationSession::start(
            &SyncConfig::default(),
            source.clone(),
            Arc::new(push.clone()),
        )
    }

    #[tokio::test]
    async fn cold_start_then_push_event_alerts_and_refreshes() {
        let source = FakePollSource::new(vec![notification("1", 0, false)]);
        let push = BroadcastPushChannel::new(8);
        let session = start(&source, &push);
        let sync = session.synchronizer().clone();
        let mut alerts = sync.alerts();

        let mut snapshots = sync.subscribe();
        snapshots
            .wait_for(|s| s.unread_count == 1 && !s.refresh_in_flight)
            .await
            .unwrap();

        push.emit(PushEvent::entity_changed("movie", "created", json!({"title": "X"})));
        let alert = alerts.recv().await.unwrap();
        assert_eq!(alert.title, "Thông báo phim");
        assert_eq!(alert.body, "X đã được thêm mới");
        assert_eq!(alert.severity, Severity::Success);

        settle().await;
        assert_eq!(source.fetch_calls(), 2);

        session.shutdown();
    }

    #[tokio::test]
    async fn connection_state_follows_channel() {
        let source = FakePollSource::new(vec![]);
        let push = BroadcastPushChannel::new(8);
        push.set_connected(true);

        let session = start(&source, &push);
        let sync = session.synchronizer().clone();
        assert!(sync.snapshot().connection.connected);

        push.set_connected(false);
        settle().await;
        assert!(!sync.snapshot().connection.connected);
    }

    #[tokio::test]
    async fn shutdown_discards_in_flight_refresh() {
        let source = FakePollSource::new(vec![notification("1", 0, false)]);
        let gate = source.hold_fetches();
        let push = BroadcastPushChannel::new(8);
        let session = start(&source, &push);
        let sync = session.synchronizer().clone();

        let mut snapshots = sync.subscribe();
        snapshots
            .wait_for(|s| s.refresh_in_flight)
            .await
            .unwrap();

        session.shutdown();
        assert!(!sync.snapshot().refresh_in_flight);
        gate.notify_one();
        settle().await;

        assert!(sync.snapshot().notifications.is_empty());
        assert_eq!(sync.refresh().await, RefreshOutcome::Discarded);

        push.emit(PushEvent::generic(json!({})));
        settle().await;
        assert_eq!(source.fetch_calls(), 1);
    }
}
