//! Recently-failed relays, owned by the caller and shared by reference.
//!
//! The submission flow records a url on definitive rejection; the selector
//! reads entries and deletes the ones older than its failure window. The
//! map sits behind a mutex so a whole selection pass (read, then maybe
//! delete) is atomic with respect to concurrent selections.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// `url → last failure timestamp (ms since epoch)`.
#[derive(Debug, Default)]
pub struct FailureRecord {
    entries: Mutex<HashMap<String, u64>>,
}

impl FailureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&self, url: &str) {
        self.record_failure_at(url, now_ms());
    }

    pub fn record_failure_at(&self, url: &str, timestamp_ms: u64) {
        self.lock().insert(url.to_string(), timestamp_ms);
    }

    pub fn last_failure(&self, url: &str) -> Option<u64> {
        self.lock().get(url).copied()
    }

    pub fn remove(&self, url: &str) -> Option<u64> {
        self.lock().remove(url)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
