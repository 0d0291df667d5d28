use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::notification::NotificationStatus;

use super::store::HistoryStore;
use super::types::{is_valid_transition, HistoryEntry, HistoryEvent};

/// Append-only audit trail with transition enforcement.
pub struct HistoryLedger {
    store: Arc<dyn HistoryStore>,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Append one entry.
    ///
    /// When both a previous and a new status are given, the pair must be a
    /// legal transition; an illegal pair is rejected before anything is
    /// written.
    pub async fn append(
        &self,
        notification_id: Uuid,
        user_id: &str,
        event: HistoryEvent,
        previous_status: Option<NotificationStatus>,
        new_status: Option<NotificationStatus>,
        details: Option<String>,
    ) -> Result<HistoryEntry> {
        if let (Some(from), Some(to)) = (previous_status, new_status) {
            if !is_valid_transition(from, to) {
                return Err(EngineError::Validation(format!(
                    "Illegal status transition {from} -> {to}"
                )));
            }
        }

        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            notification_id,
            user_id: user_id.to_string(),
            event,
            previous_status,
            new_status,
            timestamp: Utc::now(),
            details,
        };

        self.store.insert(entry.clone()).await?;

        tracing::debug!(
            notification_id = %notification_id,
            event = %event,
            previous_status = ?previous_status,
            new_status = ?new_status,
            "History entry appended"
        );

        Ok(entry)
    }

    /// Entries for one notification, chronological ascending.
    pub async fn by_notification(&self, notification_id: Uuid) -> Result<Vec<HistoryEntry>> {
        self.store.by_notification(notification_id).await
    }

    /// Entries for one user, reverse-chronological.
    pub async fn by_user(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        self.store.by_user(user_id).await
    }

    /// Entries inside a time window, chronological ascending.
    pub async fn by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>> {
        self.store.by_date_range(from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;

    fn ledger() -> HistoryLedger {
        HistoryLedger::new(Arc::new(MemoryHistoryStore::new()))
    }

    #[tokio::test]
    async fn test_append_and_read_chronological() {
        let ledger = ledger();
        let id = Uuid::new_v4();

        ledger
            .append(id, "u1", HistoryEvent::Created, None, None, None)
            .await
            .unwrap();
        ledger
            .append(
                id,
                "u1",
                HistoryEvent::Sent,
                Some(NotificationStatus::Pending),
                Some(NotificationStatus::Sent),
                None,
            )
            .await
            .unwrap();

        let entries = ledger.by_notification(id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, HistoryEvent::Created);
        assert_eq!(entries[1].event, HistoryEvent::Sent);
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected_before_write() {
        let ledger = ledger();
        let id = Uuid::new_v4();

        let result = ledger
            .append(
                id,
                "u1",
                HistoryEvent::Delivered,
                Some(NotificationStatus::Pending),
                Some(NotificationStatus::Delivered),
                None,
            )
            .await;

        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert!(ledger.by_notification(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_by_user_reverse_chronological() {
        let ledger = ledger();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        ledger
            .append(first, "u1", HistoryEvent::Created, None, None, None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        ledger
            .append(second, "u1", HistoryEvent::Created, None, None, None)
            .await
            .unwrap();
        ledger
            .append(Uuid::new_v4(), "u2", HistoryEvent::Created, None, None, None)
            .await
            .unwrap();

        let entries = ledger.by_user("u1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].notification_id, second);
        assert_eq!(entries[1].notification_id, first);
    }

    #[tokio::test]
    async fn test_by_date_range() {
        let ledger = ledger();
        let id = Uuid::new_v4();

        let before = Utc::now();
        ledger
            .append(id, "u1", HistoryEvent::Created, None, None, None)
            .await
            .unwrap();
        let after = Utc::now();

        let hit = ledger.by_date_range(before, after).await.unwrap();
        assert_eq!(hit.len(), 1);

        let miss = ledger
            .by_date_range(after + chrono::Duration::seconds(1), after + chrono::Duration::seconds(2))
            .await
            .unwrap();
        assert!(miss.is_empty());
    }
}
