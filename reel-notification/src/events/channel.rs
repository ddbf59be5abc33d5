use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::PushEvent;

pub type PushStream = BoxStream<'static, PushEvent>;

/// Capability supplied by the embedding application.
///
/// Delivery is best-effort and at-most-once; events sent before a reconnect
/// may never arrive.
pub trait PushChannel: Send + Sync {
    /// Subscribe. The stream sees every event published after this call and
    /// ends when the channel is closed for good.
    fn events(&self) -> PushStream;

    /// Current liveness.
    fn is_connected(&self) -> bool;
}

/// In-process push channel backed by a `tokio::sync::broadcast` fan-out.
///
/// The transport glue (socket client, test harness, ...) calls [`emit`] and
/// [`set_connected`]; every subscriber gets its own copy. Subscribers that
/// lag more than the capacity skip events, which is the same loss model as
/// the real channel.
///
/// Cheap to clone (interior `Arc`).
///
/// [`emit`]: BroadcastPushChannel::emit
/// [`set_connected`]: BroadcastPushChannel::set_connected
#[derive(Clone)]
pub struct BroadcastPushChannel {
    tx: broadcast::Sender<PushEvent>,
    connected: Arc<AtomicBool>,
}

impl BroadcastPushChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publish an event. Returns the number of subscribers that will see it.
    pub fn emit(&self, event: PushEvent) -> usize {
        debug!(kind = event.kind(), "push event emitted");
        // Err only means nobody is subscribed yet.
        self.tx.send(event).unwrap_or(0)
    }

    /// Record a liveness change and publish it as a `connection` event.
    pub fn set_connected(&self, connected: bool) -> usize {
        let previous = self.connected.swap(connected, Ordering::SeqCst);
        if previous != connected {
            info!(connected, "push channel liveness changed");
        }
        self.emit(PushEvent::Connection { connected })
    }
}

impl Default for BroadcastPushChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

impl PushChannel for BroadcastPushChannel {
    fn events(&self) -> PushStream {
        let mut rx = self.tx.subscribe();

        let stream = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("push subscriber lagged, skipped {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("push channel closed, ending stream");
                        break;
                    }
                }
            }
        };

        Box::pin(stream)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn fanout_to_every_subscriber() {
        let channel = BroadcastPushChannel::new(16);
        let mut a = channel.events();
        let mut b = channel.events();

        let evt = PushEvent::generic(json!({"title": "hello"}));
        assert_eq!(channel.emit(evt.clone()), 2);

        assert_eq!(a.next().await.unwrap(), evt);
        assert_eq!(b.next().await.unwrap(), evt);
    }

    #[tokio::test]
    async fn events_before_subscribe_are_not_replayed() {
        let channel = BroadcastPushChannel::new(16);
        assert_eq!(channel.emit(PushEvent::generic(json!({}))), 0);

        let mut stream = channel.events();
        channel.set_connected(true);
        assert_eq!(
            stream.next().await.unwrap(),
            PushEvent::Connection { connected: true }
        );
        assert!(channel.is_connected());
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_and_continues() {
        let channel = BroadcastPushChannel::new(2);
        let mut stream = channel.events();

        for i in 0..5 {
            channel.emit(PushEvent::generic(json!({ "seq": i })));
        }

        // the oldest events are gone, the stream resumes at the retained tail
        let first = stream.next().await.unwrap();
        assert_eq!(first, PushEvent::generic(json!({ "seq": 3 })));
    }

    #[tokio::test]
    async fn stream_ends_when_channel_dropped() {
        let channel = BroadcastPushChannel::new(4);
        let mut stream = channel.events();
        drop(channel);
        assert!(stream.next().await.is_none());
    }
}
