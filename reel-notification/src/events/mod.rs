// src/events/mod.rs
//
// Push-side inputs of the synchronizer.
//
// The push transport (whatever it is: socket, SSE, an in-process bus) hands
// us `PushEvent`s. Data events never touch the notification list directly;
// they only ask the synchronizer to refresh and, once the first snapshot has
// landed, to surface an ephemeral alert.
//
// ────────────────────────────────────────────────────────────────────────────

pub mod channel;
pub mod subscriber;

use serde::{Deserialize, Serialize};

pub use channel::{BroadcastPushChannel, PushChannel, PushStream};

/// Best-effort, at-most-once event delivered by the push channel.
///
/// ```json
/// { "kind": "entity-changed", "entity_type": "movie", "action": "created",
///   "payload": { "title": "Avatar" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PushEvent {
    /// A dashboard entity (movie, user, role, ...) was created/updated/deleted.
    EntityChanged {
        #[serde(alias = "entityType")]
        entity_type: String,
        action: String,
        #[serde(default)]
        payload: serde_json::Value,
    },

    /// Free-form notification pushed by the backend.
    GenericNotification {
        #[serde(default)]
        payload: serde_json::Value,
    },

    /// Liveness of the channel itself.
    Connection { connected: bool },
}

impl PushEvent {
    pub fn entity_changed(
        entity_type: impl Into<String>,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::EntityChanged {
            entity_type: entity_type.into(),
            action: action.into(),
            payload,
        }
    }

    pub fn generic(payload: serde_json::Value) -> Self {
        Self::GenericNotification { payload }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::EntityChanged { .. } => "entity-changed",
            Self::GenericNotification { .. } => "generic-notification",
            Self::Connection { .. } => "connection",
        }
    }
}
