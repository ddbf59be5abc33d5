//! Test doubles shared by the unit tests of this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use reel_shared::errors::TransportError;

use crate::models::{Category, Notification};
use crate::services::poll_source::PollSource;

pub(crate) fn notification(id: &str, minute: u32, read: bool) -> Notification {
    Notification {
        id: id.to_string(),
        title: format!("Thông báo {id}"),
        body: format!("nội dung {id}"),
        category: Category::Info,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
        read,
        related_entity: None,
    }
}

/// Let spawned tasks on the current-thread runtime run until they block.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// In-memory poll source that behaves like the REST backend: successful
/// mark calls update the stored records.
#[derive(Default)]
pub(crate) struct FakePollSource {
    records: Mutex<Vec<Notification>>,
    fetch_calls: AtomicUsize,
    mark_all_calls: AtomicUsize,
    marked: Mutex<Vec<String>>,
    fail_fetch: AtomicBool,
    fail_marks: AtomicBool,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    mark_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakePollSource {
    pub(crate) fn new(records: Vec<Notification>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            ..Self::default()
        })
    }

    pub(crate) fn set_records(&self, records: Vec<Notification>) {
        *self.records.lock().unwrap() = records;
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_all_calls(&self) -> usize {
        self.mark_all_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn marked_ids(&self) -> Vec<String> {
        self.marked.lock().unwrap().clone()
    }

    pub(crate) fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_marks(&self, fail: bool) {
        self.fail_marks.store(fail, Ordering::SeqCst);
    }

    /// Every subsequent fetch waits for one `notify_one` on the returned gate.
    pub(crate) fn hold_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Every subsequent mark call waits for one `notify_one` on the returned gate.
    pub(crate) fn hold_marks(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.mark_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn pass(gate: &Mutex<Option<Arc<Notify>>>) {
        let gate = gate.lock().unwrap().clone();
        match gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }
    }
}

#[async_trait]
impl PollSource for FakePollSource {
    async fn fetch_all(&self) -> Result<Vec<Notification>, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Self::pass(&self.fetch_gate).await;

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(TransportError::network("connection reset by peer"));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn mark_one_read(&self, id: &str) -> Result<(), TransportError> {
        self.marked.lock().unwrap().push(id.to_string());
        Self::pass(&self.mark_gate).await;

        if self.fail_marks.load(Ordering::SeqCst) {
            return Err(TransportError::status(503, "Service Unavailable"));
        }
        for record in self.records.lock().unwrap().iter_mut() {
            if record.id == id {
                record.read = true;
            }
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), TransportError> {
        self.mark_all_calls.fetch_add(1, Ordering::SeqCst);
        Self::pass(&self.mark_gate).await;

        if self.fail_marks.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout);
        }
        for record in self.records.lock().unwrap().iter_mut() {
            record.read = true;
        }
        Ok(())
    }
}
