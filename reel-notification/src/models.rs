use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display category of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Category {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Lenient parse; anything unrecognised is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "success" => Some(Self::Success),
            "warning" | "warn" => Some(Self::Warning),
            "error" | "danger" => Some(Self::Error),
            _ => None,
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_default()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup key for the subject of a notification (a movie, a user, ...).
///
/// Only the presentation layer resolves it, for deep-linking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    #[serde(rename = "type", alias = "entity_type")]
    pub entity_type: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    #[serde(alias = "message")]
    pub body: String,
    #[serde(default, alias = "type")]
    pub category: Category,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "is_read", alias = "read", alias = "isRead", default)]
    pub read: bool,
    #[serde(
        default,
        alias = "relatedEntity",
        skip_serializing_if = "Option::is_none"
    )]
    pub related_entity: Option<RelatedEntity>,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        !self.read
    }

    /// Short relative age label shown next to the notification.
    pub fn age(&self, now: DateTime<Utc>) -> String {
        let secs = (now - self.created_at).num_seconds().max(0);
        match secs {
            0..=59 => "vừa xong".to_string(),
            60..=3_599 => format!("{} phút trước", secs / 60),
            3_600..=86_399 => format!("{} giờ trước", secs / 3_600),
            _ => format!("{} ngày trước", secs / 86_400),
        }
    }
}

/// Number of unread records. Always recomputed, never cached.
pub fn derive_unread_count(list: &[Notification]) -> usize {
    list.iter().filter(|n| n.is_unread()).count()
}

/// Build the next authoritative list from a fetch result.
///
/// The fetched list wins outright: no field of `old` survives. Duplicate ids
/// keep their first occurrence, and the result is ordered newest first with a
/// stable sort so equal timestamps keep server order.
pub fn merge_by_id(old: &[Notification], fresh: Vec<Notification>) -> Vec<Notification> {
    let mut seen = HashSet::with_capacity(fresh.len());
    let mut merged: Vec<Notification> = fresh
        .into_iter()
        .filter(|n| seen.insert(n.id.clone()))
        .collect();
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if tracing::enabled!(tracing::Level::TRACE) {
        let previous: HashSet<&str> = old.iter().map(|n| n.id.as_str()).collect();
        let added = merged
            .iter()
            .filter(|n| !previous.contains(n.id.as_str()))
            .count();
        tracing::trace!(added, total = merged.len(), "notification list replaced");
    }

    merged
}

/// Liveness of the push channel. Presentational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub connected: bool,
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct NotificationSnapshot {
    pub notifications: Arc<[Notification]>,
    pub unread_count: usize,
    pub connection: ConnectionState,
    pub refresh_in_flight: bool,
}

impl NotificationSnapshot {
    pub fn new(
        notifications: &[Notification],
        connection: ConnectionState,
        refresh_in_flight: bool,
    ) -> Self {
        Self {
            notifications: Arc::from(notifications),
            unread_count: derive_unread_count(notifications),
            connection,
            refresh_in_flight,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }
}

impl Default for NotificationSnapshot {
    fn default() -> Self {
        Self::new(&[], ConnectionState::default(), false)
    }
}
