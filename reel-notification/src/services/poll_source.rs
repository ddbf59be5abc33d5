use async_trait::async_trait;

use reel_shared::errors::TransportError;

use crate::models::Notification;

/// REST-style source of the authoritative notification list.
///
/// Implementations own their timeouts; a timeout surfaces here as an ordinary
/// `TransportError`.
#[async_trait]
pub trait PollSource: Send + Sync {
    /// Fetch the current list for the signed-in administrator.
    async fn fetch_all(&self) -> Result<Vec<Notification>, TransportError>;

    /// Persist the read flag of a single notification.
    async fn mark_one_read(&self, id: &str) -> Result<(), TransportError>;

    /// Persist the read flag of every notification.
    async fn mark_all_read(&self) -> Result<(), TransportError>;
}
