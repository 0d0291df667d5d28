use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::Result;

use super::types::{Notification, NotificationStatus};

/// Storage operations for notifications.
///
/// The engine is agnostic to the backing technology; it drives everything
/// through this trait. Concurrency control over dispatch is handled above the
/// store with per-notification-id mutexes, so implementations only need
/// row-level atomicity for `update`.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: Notification) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Notification>>;

    /// Replace the stored row. `updated_at` is stamped by the store.
    async fn update(&self, notification: Notification) -> Result<()>;

    /// All notifications for a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>>;

    /// Count of stored notifications with the given status.
    async fn count_by_status(&self, status: NotificationStatus) -> Result<usize>;
}

/// In-memory notification store backed by `DashMap`.
pub struct MemoryNotificationStore {
    rows: DashMap<Uuid, Notification>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl Default for MemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, notification: Notification) -> Result<()> {
        self.rows.insert(notification.id, notification);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.rows.get(&id).map(|n| n.clone()))
    }

    async fn update(&self, mut notification: Notification) -> Result<()> {
        notification.updated_at = Utc::now();
        self.rows.insert(notification.id, notification);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .rows
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn count_by_status(&self, status: NotificationStatus) -> Result<usize> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| entry.value().status == status)
            .count())
    }
}
