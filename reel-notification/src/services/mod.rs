pub mod http_source;
pub mod poll_source;
pub mod scheduler;
pub mod session;
pub mod synchronizer;

pub use http_source::HttpPollSource;
pub use poll_source::PollSource;
pub use scheduler::Scheduler;
pub use session::NotificationSession;
pub use synchronizer::{RefreshOutcome, SyncFailure, SyncOperation, Synchronizer};
