use futures::StreamExt;
use tokio::sync::watch;

use crate::events::PushStream;
use crate::services::synchronizer::Synchronizer;

/// Forward push events into the synchronizer until the stream ends or
/// `shutdown` flips to `true`.
pub async fn listen_push_events(
    sync: Synchronizer,
    mut events: PushStream,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("listening for push events");

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    tracing::warn!("push channel closed");
                    break;
                };

                tracing::debug!(kind = event.kind(), "received push event");
                if sync.on_push_event(event).is_none() && sync.is_torn_down() {
                    break;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("push listener stopped");
}
