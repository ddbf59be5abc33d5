use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use reel_notification::config::SyncConfig;
use reel_notification::events::BroadcastPushChannel;
use reel_notification::services::{HttpPollSource, NotificationSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    reel_shared::telemetry::init_tracing("reel-notification");

    let config = SyncConfig::load()?;
    config.log_summary();

    if let Some(addr) = config.metrics_socket_addr()? {
        reel_shared::telemetry::init_metrics(addr)?;
    }

    let source = Arc::new(HttpPollSource::new(&config)?);
    // Held for the process lifetime; the socket glue publishes through it.
    let push = BroadcastPushChannel::default();

    let session = NotificationSession::start(&config, source, Arc::new(push.clone()));
    let sync = session.synchronizer().clone();

    // Log snapshot changes
    let mut snapshots = sync.subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let (total, unread, connected, in_flight) = {
                let snap = snapshots.borrow_and_update();
                (
                    snap.notifications.len(),
                    snap.unread_count,
                    snap.connection.connected,
                    snap.refresh_in_flight,
                )
            };
            tracing::info!(total, unread, connected, in_flight, "snapshot updated");
        }
    });

    // Log alerts
    let mut alerts = sync.alerts();
    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(alert) => tracing::info!(
                    alert_id = %alert.id,
                    severity = %alert.severity,
                    title = %alert.title,
                    body = %alert.body,
                    "alert"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "alert log lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Log failures
    let mut failures = sync.failures();
    tokio::spawn(async move {
        loop {
            match failures.recv().await {
                Ok(failure) => tracing::error!(
                    operation = failure.operation.as_str(),
                    error = %failure.error,
                    at = %failure.at,
                    "notification sync failure"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "failure log lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tracing::info!("reel-notification running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    session.shutdown();
    drop(push);
    tracing::info!("reel-notification stopped");

    Ok(())
}
