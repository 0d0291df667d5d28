use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::Result;

use super::types::HistoryEntry;

/// Append-only storage for audit trail entries.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert(&self, entry: HistoryEntry) -> Result<()>;

    /// Entries for one notification, chronological ascending.
    async fn by_notification(&self, notification_id: Uuid) -> Result<Vec<HistoryEntry>>;

    /// Entries for one user, reverse-chronological.
    async fn by_user(&self, user_id: &str) -> Result<Vec<HistoryEntry>>;

    /// Entries inside a time window, chronological ascending.
    async fn by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>>;
}

/// In-memory history store.
///
/// Entries are stored per notification in arrival order; the timestamp sorts
/// used by the queries are stable, so same-instant entries keep their
/// insertion order.
pub struct MemoryHistoryStore {
    entries: DashMap<Uuid, Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn all_entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn insert(&self, entry: HistoryEntry) -> Result<()> {
        self.entries
            .entry(entry.notification_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn by_notification(&self, notification_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let mut entries = self
            .entries
            .get(&notification_id)
            .map(|e| e.clone())
            .unwrap_or_default();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn by_user(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self
            .all_entries()
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    async fn by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self
            .all_entries()
            .into_iter()
            .filter(|e| e.timestamp >= from && e.timestamp <= to)
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}
