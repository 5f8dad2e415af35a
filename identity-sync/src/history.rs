//! Bounded caches owned by the caller.
//!
//! Recently used keys and a log of finished synchronization cycles. The
//! engine never reads either. An engine built `with_history` appends one
//! [`HistoryEntry`] per cycle; `SavedKeys` is left entirely to embedding
//! front ends that offer key completion.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::coordinator::UpdateOutcome;
use crate::edit::EditKind;
use crate::error::SyncError;
use crate::types::TransactionId;

/// Default number of remembered keys.
const DEFAULT_SAVED_KEYS: usize = 64;

/// Default number of retained history entries.
const DEFAULT_HISTORY_ENTRIES: usize = 500;

/// Most-recently-used list of keys, bounded.
#[derive(Debug, Clone)]
pub struct SavedKeys {
    keys: VecDeque<String>,
    capacity: usize,
}

impl SavedKeys {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SAVED_KEYS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Remember `key`, moving it to the front if already present.
    pub fn remember(&mut self, key: impl Into<String>) {
        let key = key.into();
        if let Some(pos) = self.keys.iter().position(|k| *k == key) {
            self.keys.remove(pos);
        }
        self.keys.push_front(key);
        self.keys.truncate(self.capacity);
    }

    pub fn forget(&mut self, key: &str) {
        self.keys.retain(|k| k != key);
    }

    /// Keys starting with `prefix`, most recent first
    pub fn matching<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.keys
            .iter()
            .map(String::as_str)
            .filter(move |k| k.starts_with(prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for SavedKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// What a finished cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ContentMapEdit,
    MultiMapEdit,
    BatchReplace,
}

/// A finished synchronization cycle.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub entry_id: String,
    pub address: String,
    pub operation: Operation,
    pub edit_kind: Option<EditKind>,
    pub txid: Option<TransactionId>,
    /// Rendered failure, if the cycle failed
    pub error: Option<String>,
    /// Rendered refresh warning, if the refresh failed
    pub refresh_warning: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl HistoryEntry {
    /// Entry for a cycle started at `started_at`.
    pub fn new(
        address: impl Into<String>,
        operation: Operation,
        edit_kind: Option<EditKind>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            address: address.into(),
            operation,
            edit_kind,
            txid: None,
            error: None,
            refresh_warning: None,
            started_at,
            duration_ms: 0,
        }
    }

    /// Fill in the result of the cycle.
    pub fn finish(mut self, result: &Result<UpdateOutcome, SyncError>) -> Self {
        match result {
            Ok(outcome) => {
                self.txid = Some(outcome.txid.clone());
                self.refresh_warning = outcome.refresh_error.as_ref().map(ToString::to_string);
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self.duration_ms = (Utc::now() - self.started_at).num_milliseconds().max(0) as u64;
        self
    }

    pub fn succeeded(&self) -> bool {
        self.txid.is_some()
    }
}

/// Bounded log of finished cycles, newest first.
pub struct SyncHistory {
    entries: Arc<RwLock<VecDeque<HistoryEntry>>>,
    max_entries: usize,
}

impl SyncHistory {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_HISTORY_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.write().await;
        entries.push_front(entry);

        while entries.len() > self.max_entries {
            entries.pop_back();
        }
    }

    /// Most recent `limit` entries
    pub async fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.read().await;
        entries.iter().take(limit).cloned().collect()
    }

    /// Entries touching one identity, newest first
    pub async fn for_address(&self, address: &str) -> Vec<HistoryEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| e.address == address)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for SyncHistory {
    fn default() -> Self {
        Self::new()
    }
}
