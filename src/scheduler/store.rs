use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::Result;

use super::types::{ScheduleStatus, ScheduledNotification};

/// Storage operations for schedule rows.
///
/// `claim` is the concurrency-control primitive: an atomic conditional
/// transition on the status field ("to processing only if currently
/// scheduled"), so two pollers can never both dispatch the same row. A SQL
/// backend would express it as a conditional UPDATE; the memory backend uses
/// the map's per-entry lock.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert(&self, row: ScheduledNotification) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<ScheduledNotification>>;

    async fn get_by_notification(
        &self,
        notification_id: Uuid,
    ) -> Result<Option<ScheduledNotification>>;

    async fn update(&self, row: ScheduledNotification) -> Result<()>;

    /// Rows due for dispatch: status scheduled and `next_attempt_at <= now`,
    /// ascending by `next_attempt_at`, capped at `limit`.
    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledNotification>>;

    /// Atomically move a row from scheduled to processing, incrementing
    /// `attempts` and stamping `last_attempt_at`. Returns the claimed row, or
    /// `None` when the row is gone or no longer scheduled.
    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<ScheduledNotification>>;
}

/// In-memory schedule store backed by `DashMap`.
pub struct MemoryScheduleStore {
    rows: DashMap<Uuid, ScheduledNotification>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl Default for MemoryScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn insert(&self, row: ScheduledNotification) -> Result<()> {
        self.rows.insert(row.id, row);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScheduledNotification>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    async fn get_by_notification(
        &self,
        notification_id: Uuid,
    ) -> Result<Option<ScheduledNotification>> {
        Ok(self
            .rows
            .iter()
            .find(|entry| entry.value().notification_id == notification_id)
            .map(|entry| entry.value().clone()))
    }

    async fn update(&self, row: ScheduledNotification) -> Result<()> {
        self.rows.insert(row.id, row);
        Ok(())
    }

    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledNotification>> {
        let mut due: Vec<ScheduledNotification> = self
            .rows
            .iter()
            .filter(|entry| {
                let row = entry.value();
                row.status == ScheduleStatus::Scheduled
                    && row.next_attempt_at.is_some_and(|at| at <= now)
            })
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by_key(|row| row.next_attempt_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<ScheduledNotification>> {
        // The DashMap entry lock makes the check-and-update atomic.
        match self.rows.get_mut(&id) {
            Some(mut entry) => {
                if entry.status != ScheduleStatus::Scheduled {
                    return Ok(None);
                }
                entry.status = ScheduleStatus::Processing;
                entry.attempts += 1;
                entry.last_attempt_at = Some(now);
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }
}
