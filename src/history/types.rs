use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::NotificationStatus;

/// Lifecycle event recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    Created,
    Sent,
    Delivered,
    Failed,
    Retried,
}

impl std::fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HistoryEvent::Created => "created",
            HistoryEvent::Sent => "sent",
            HistoryEvent::Delivered => "delivered",
            HistoryEvent::Failed => "failed",
            HistoryEvent::Retried => "retried",
        };
        f.write_str(s)
    }
}

/// One immutable audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub user_id: String,
    pub event: HistoryEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<NotificationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<NotificationStatus>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The fixed notification status transition table.
///
/// `pending -> {sent, failed}`, `sent -> {delivered, failed}`,
/// `delivered -> {}`, `failed -> {pending}` (explicit retry only).
pub fn is_valid_transition(from: NotificationStatus, to: NotificationStatus) -> bool {
    use NotificationStatus::*;
    matches!(
        (from, to),
        (Pending, Sent) | (Pending, Failed) | (Sent, Delivered) | (Sent, Failed) | (Failed, Pending)
    )
}
