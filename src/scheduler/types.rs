use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a scheduled delivery attempt sequence.
///
/// `Scheduled -> Processing -> {Sent | Scheduled (retry) | Failed}`;
/// `Scheduled` is also re-entered by `reschedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    Processing,
    Sent,
    Failed,
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::Processing => "processing",
            ScheduleStatus::Sent => "sent",
            ScheduleStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Retry bookkeeping for one deferred notification, one-to-one with the
/// notification row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub attempts: u32,
    pub max_attempts: u32,
    pub retry_interval_seconds: u64,
    pub status: ScheduleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledNotification {
    pub fn new(
        notification_id: Uuid,
        scheduled_at: DateTime<Utc>,
        max_attempts: u32,
        retry_interval_seconds: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            notification_id,
            attempts: 0,
            max_attempts,
            retry_interval_seconds,
            status: ScheduleStatus::Scheduled,
            next_attempt_at: Some(scheduled_at),
            last_attempt_at: None,
            error_details: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the retry budget still has room after the current attempt.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Aggregate result of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleResult {
    /// Rows claimed and driven through a delivery attempt this cycle.
    pub processed: usize,
    /// Attempts that ended with the notification sent (or already sent).
    pub successful: usize,
    /// Attempts that failed, whether retried or exhausted.
    pub failed: usize,
}
