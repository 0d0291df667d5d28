//! Preference persistence.
//!
//! The engine is agnostic to the storage technology; it only needs the
//! operations on this trait. The in-memory backend ships for embedding and
//! tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::Result;

use super::types::{Channel, NotificationType, UserNotificationPreference};

/// Storage operations for per-user preference rows.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// All stored rows for a user.
    async fn rows_for_user(&self, user_id: &str) -> Result<Vec<UserNotificationPreference>>;

    /// The stored row for one (user, type, channel), if any.
    async fn row(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        channel: Channel,
    ) -> Result<Option<UserNotificationPreference>>;

    /// Upsert a batch of rows for one user. The whole batch is applied or
    /// none of it is.
    async fn upsert_all(&self, rows: Vec<UserNotificationPreference>) -> Result<()>;
}

type PreferenceKey = (String, NotificationType, Channel);

/// In-memory preference store backed by `DashMap`.
pub struct MemoryPreferenceStore {
    rows: DashMap<PreferenceKey, UserNotificationPreference>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn rows_for_user(&self, user_id: &str) -> Result<Vec<UserNotificationPreference>> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn row(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        channel: Channel,
    ) -> Result<Option<UserNotificationPreference>> {
        let key = (user_id.to_string(), notification_type, channel);
        Ok(self.rows.get(&key).map(|r| r.clone()))
    }

    async fn upsert_all(&self, rows: Vec<UserNotificationPreference>) -> Result<()> {
        let now = Utc::now();
        for mut row in rows {
            row.updated_at = now;
            let key = (row.user_id.clone(), row.notification_type, row.channel);
            self.rows.insert(key, row);
        }
        Ok(())
    }
}
