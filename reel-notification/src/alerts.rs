use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::events::PushEvent;
use crate::models::Category;

/// Alerts reuse the notification categories as their severity.
pub type Severity = Category;

const DEFAULT_ENTITY_TITLE: &str = "Thông báo";
const DEFAULT_GENERIC_TITLE: &str = "Thông báo mới";
const FALLBACK_BODY: &str = "Có thay đổi mới trong hệ thống";

/// Short-lived message shown on top of the dashboard. Dismissal timing is the
/// presentation layer's business.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// `alert_<uuid-v4>`, usable as a dismissal key.
    pub id: String,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: format!("alert_{}", uuid::Uuid::new_v4()),
            title: title.into(),
            body: body.into(),
            severity,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityKind {
    Movie,
    Episode,
    User,
    Role,
    Advertisement,
    Feedback,
    Report,
}

impl EntityKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" | "film" => Some(Self::Movie),
            "episode" | "episodes" => Some(Self::Episode),
            "user" | "users" => Some(Self::User),
            "role" | "roles" => Some(Self::Role),
            "advertisement" | "advertisements" | "ad" | "ads" => Some(Self::Advertisement),
            "feedback" | "feedbacks" => Some(Self::Feedback),
            "report" | "reports" => Some(Self::Report),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Movie => "phim",
            Self::Episode => "tập phim",
            Self::User => "người dùng",
            Self::Role => "vai trò",
            Self::Advertisement => "quảng cáo",
            Self::Feedback => "phản hồi",
            Self::Report => "báo cáo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityAction {
    Created,
    Updated,
    Deleted,
}

impl EntityAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" | "create" | "added" => Some(Self::Created),
            "updated" | "update" | "edited" => Some(Self::Updated),
            "deleted" | "delete" | "removed" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Map a push event to an ephemeral alert.
///
/// Pure: no state, no I/O. `connection` events have no alert. Entity events
/// with an unknown type or action get a generic "something changed" message.
pub fn format_alert(event: &PushEvent) -> Option<Alert> {
    match event {
        PushEvent::EntityChanged {
            entity_type,
            action,
            payload,
        } => Some(format_entity_change(entity_type, action, payload)),
        PushEvent::GenericNotification { payload } => Some(format_generic(payload)),
        PushEvent::Connection { .. } => None,
    }
}

fn format_entity_change(entity_type: &str, action: &str, payload: &Value) -> Alert {
    let (Some(kind), Some(action)) = (EntityKind::parse(entity_type), EntityAction::parse(action))
    else {
        return Alert::new(DEFAULT_ENTITY_TITLE, FALLBACK_BODY, Severity::Info);
    };

    let name = first_str(payload, &["title", "name", "username", "email"])
        .unwrap_or_else(|| kind.label());
    let title = format!("Thông báo {}", kind.label());

    match action {
        EntityAction::Created => {
            Alert::new(title, format!("{name} đã được thêm mới"), Severity::Success)
        }
        EntityAction::Updated => {
            Alert::new(title, format!("{name} đã được cập nhật"), Severity::Info)
        }
        EntityAction::Deleted => Alert::new(title, format!("{name} đã bị xóa"), Severity::Warning),
    }
}

fn format_generic(payload: &Value) -> Alert {
    let title = first_str(payload, &["title"]).unwrap_or(DEFAULT_GENERIC_TITLE);
    let body = first_str(payload, &["body", "message"]).unwrap_or_default();
    let severity = first_str(payload, &["severity", "type"])
        .and_then(Severity::parse)
        .unwrap_or_default();

    Alert::new(title, body, severity)
}

fn first_str<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| payload.get(key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}
