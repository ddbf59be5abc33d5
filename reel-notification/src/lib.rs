//! Notification aggregation and read-state synchronization for the Reel admin
//! dashboard.
//!
//! A [`NotificationSession`] owns one [`Synchronizer`], refreshed on a timer
//! and whenever the push channel reports a change. The presentation layer
//! consumes snapshots, alerts and failures from the synchronizer.

pub mod alerts;
pub mod config;
pub mod events;
pub mod models;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use alerts::{format_alert, Alert, Severity};
pub use config::SyncConfig;
pub use events::{BroadcastPushChannel, PushChannel, PushEvent};
pub use models::{Category, ConnectionState, Notification, NotificationSnapshot};
pub use services::{
    HttpPollSource, NotificationSession, PollSource, RefreshOutcome, SyncFailure, SyncOperation,
    Synchronizer,
};
