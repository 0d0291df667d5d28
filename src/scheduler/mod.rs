//! Time-driven delivery scheduling with bounded retry.
//!
//! The scheduler owns every `ScheduledNotification` row. A single background
//! task polls for due rows on a fixed interval and drives them through the
//! manager's dispatch path (`send` for a first attempt, `retry` for
//! re-attempts); a failed provider attempt is retried after
//! `retry_interval_seconds` until the attempt budget is exhausted, at which
//! point the row is terminally failed. Rows are claimed with an atomic
//! conditional status transition, so a cycle and a concurrent caller can
//! never dispatch the same row twice.

mod store;
mod types;

pub use store::{MemoryScheduleStore, ScheduleStore};
pub use types::{CycleResult, ScheduleStatus, ScheduledNotification};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::{EngineError, Result};
use crate::metrics::SchedulerMetrics;
use crate::notification::{CreateNotificationRequest, NotificationManager, NotificationStatus};

/// Outcome of processing one claimed row.
enum ItemOutcome {
    /// The notification went out (or had already gone out via a manual send).
    Success,
    /// The attempt failed; the row was retried or terminally failed.
    Failed,
    /// The row could not be claimed; nothing was attempted.
    Skipped,
}

/// Polls due scheduled notifications and drives delivery with retry
/// bookkeeping.
pub struct Scheduler {
    store: Arc<dyn ScheduleStore>,
    manager: Arc<NotificationManager>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        manager: Arc<NotificationManager>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            manager,
            config,
        }
    }

    /// Create a deferred notification and its schedule row.
    ///
    /// Creation goes through the manager, so preference gating applies at
    /// schedule time and a denied request leaves no rows behind.
    #[tracing::instrument(
        name = "scheduler.schedule",
        skip(self, request),
        fields(user_id = %request.user_id, channel = %request.channel)
    )]
    pub async fn schedule(
        &self,
        mut request: CreateNotificationRequest,
        scheduled_at: DateTime<Utc>,
        max_attempts: Option<u32>,
        retry_interval_seconds: Option<u64>,
    ) -> Result<ScheduledNotification> {
        if scheduled_at <= Utc::now() {
            return Err(EngineError::Validation(
                "scheduled_at must be strictly in the future".to_string(),
            ));
        }

        let max_attempts = max_attempts.unwrap_or(self.config.default_max_attempts);
        let retry_interval =
            retry_interval_seconds.unwrap_or(self.config.default_retry_interval_seconds);
        if max_attempts == 0 {
            return Err(EngineError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if retry_interval == 0 {
            return Err(EngineError::Validation(
                "retry_interval_seconds must be at least 1".to_string(),
            ));
        }

        request.scheduled_at = Some(scheduled_at);
        let notification = self.manager.create(request).await?;

        let row = ScheduledNotification::new(
            notification.id,
            scheduled_at,
            max_attempts,
            retry_interval,
        );
        self.store.insert(row.clone()).await?;
        SchedulerMetrics::record_scheduled();

        tracing::info!(
            schedule_id = %row.id,
            notification_id = %notification.id,
            scheduled_at = %scheduled_at,
            max_attempts = max_attempts,
            "Notification scheduled"
        );

        Ok(row)
    }

    /// Move a still-scheduled row to a new time, resetting its retry budget.
    pub async fn reschedule(
        &self,
        id: Uuid,
        new_time: DateTime<Utc>,
    ) -> Result<ScheduledNotification> {
        if new_time <= Utc::now() {
            return Err(EngineError::Validation(
                "new_time must be strictly in the future".to_string(),
            ));
        }

        let mut row = self.load(id).await?;
        if row.status != ScheduleStatus::Scheduled {
            return Err(EngineError::InvalidState {
                operation: "reschedule",
                current: row.status.to_string(),
            });
        }

        row.attempts = 0;
        row.next_attempt_at = Some(new_time);
        row.error_details = None;
        self.store.update(row.clone()).await?;

        tracing::info!(schedule_id = %id, new_time = %new_time, "Schedule moved");

        Ok(row)
    }

    /// Cancel a still-scheduled row and its pending notification.
    pub async fn cancel_scheduled(&self, id: Uuid) -> Result<ScheduledNotification> {
        let mut row = self.load(id).await?;
        if row.status != ScheduleStatus::Scheduled {
            return Err(EngineError::InvalidState {
                operation: "cancel_scheduled",
                current: row.status.to_string(),
            });
        }

        row.status = ScheduleStatus::Failed;
        row.next_attempt_at = None;
        row.error_details = Some("Cancelled".to_string());
        self.store.update(row.clone()).await?;

        match self.manager.cancel(row.notification_id).await {
            Ok(_) => {}
            // The notification may have gone out through a manual send while
            // the schedule row was still waiting; the row is cancelled either
            // way.
            Err(EngineError::InvalidState { .. }) => {
                tracing::warn!(
                    schedule_id = %id,
                    notification_id = %row.notification_id,
                    "Cancelled schedule for a notification that already left pending"
                );
            }
            Err(err) => return Err(err),
        }

        tracing::info!(schedule_id = %id, "Schedule cancelled");

        Ok(row)
    }

    /// Fetch a schedule row by id.
    pub async fn get(&self, id: Uuid) -> Result<ScheduledNotification> {
        self.load(id).await
    }

    /// Run the polling loop until the shutdown signal fires.
    ///
    /// The interval skips missed ticks, so a cycle that overruns the poll
    /// interval is never overlapped by the next one.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut timer = tokio::time::interval(Duration::from_secs(self.config.poll_interval_seconds));
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            poll_interval_secs = self.config.poll_interval_seconds,
            batch_size = self.config.batch_size,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Scheduler received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    let result = self.run_cycle().await;
                    if result.processed > 0 {
                        tracing::info!(
                            processed = result.processed,
                            successful = result.successful,
                            failed = result.failed,
                            "Poll cycle completed"
                        );
                    }
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Execute one poll cycle over the due rows.
    ///
    /// Items are processed independently through a bounded worker pool; one
    /// item's failure never aborts the batch.
    #[tracing::instrument(name = "scheduler.run_cycle", skip(self))]
    pub async fn run_cycle(&self) -> CycleResult {
        let now = Utc::now();
        let due = match self.store.due(now, self.config.batch_size).await {
            Ok(due) => due,
            Err(err) => {
                tracing::error!(error = %err, "Failed to query due schedules");
                return CycleResult::default();
            }
        };

        if due.is_empty() {
            return CycleResult::default();
        }

        tracing::debug!(due = due.len(), "Processing due schedules");

        let mut result = CycleResult::default();
        let mut futures = FuturesUnordered::new();
        let mut in_flight = 0;

        for row in due {
            futures.push(self.process_item(row, now));
            in_flight += 1;

            while in_flight >= self.config.worker_concurrency {
                if let Some(outcome) = futures.next().await {
                    in_flight -= 1;
                    result.tally(outcome);
                } else {
                    break;
                }
            }
        }

        while let Some(outcome) = futures.next().await {
            result.tally(outcome);
        }

        SchedulerMetrics::record_cycle(result.processed, result.successful, result.failed);

        result
    }

    /// Claim and dispatch one due row, applying the retry policy to the
    /// outcome.
    async fn process_item(&self, row: ScheduledNotification, now: DateTime<Utc>) -> ItemOutcome {
        let claimed = match self.store.claim(row.id, now).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return ItemOutcome::Skipped,
            Err(err) => {
                tracing::warn!(schedule_id = %row.id, error = %err, "Failed to claim schedule row");
                return ItemOutcome::Skipped;
            }
        };

        // A first attempt finds the notification pending; a re-attempt finds
        // it failed and must walk failed -> pending through an explicit
        // retry. Anything already sent was dispatched by a concurrent manual
        // call and just settles the row.
        let attempt = match self.manager.get(claimed.notification_id).await {
            Ok(n) => match n.status {
                NotificationStatus::Pending => self.manager.send(claimed.notification_id).await,
                NotificationStatus::Failed => {
                    if n.failure_reason.as_deref() == Some("Cancelled") {
                        self.finish(claimed, ScheduleStatus::Failed, Some("Cancelled".to_string()))
                            .await;
                        return ItemOutcome::Failed;
                    }
                    self.manager.retry(claimed.notification_id).await
                }
                NotificationStatus::Sent | NotificationStatus::Delivered => {
                    self.finish(claimed, ScheduleStatus::Sent, None).await;
                    return ItemOutcome::Success;
                }
            },
            Err(err) => {
                self.finish(claimed, ScheduleStatus::Failed, Some(err.to_string()))
                    .await;
                return ItemOutcome::Failed;
            }
        };

        match attempt {
            Ok(_) => {
                self.finish(claimed, ScheduleStatus::Sent, None).await;
                ItemOutcome::Success
            }
            Err(err) if err.is_retryable() => self.apply_retry_policy(claimed, now, &err).await,
            Err(EngineError::InvalidState { .. }) => {
                // Lost the race against a manual call between the status read
                // and the dispatch. Resolve the row from the notification's
                // final state.
                let settled = matches!(
                    self.manager.get(claimed.notification_id).await,
                    Ok(n) if matches!(
                        n.status,
                        NotificationStatus::Sent | NotificationStatus::Delivered
                    )
                );
                if settled {
                    self.finish(claimed, ScheduleStatus::Sent, None).await;
                    ItemOutcome::Success
                } else {
                    self.finish(
                        claimed,
                        ScheduleStatus::Failed,
                        Some("Notification left pending outside the scheduler".to_string()),
                    )
                    .await;
                    ItemOutcome::Failed
                }
            }
            Err(err) => {
                // Non-provider errors are not retryable; fail the row.
                self.finish(claimed, ScheduleStatus::Failed, Some(err.to_string()))
                    .await;
                ItemOutcome::Failed
            }
        }
    }

    /// Schedule the next attempt or terminally fail an exhausted row.
    async fn apply_retry_policy(
        &self,
        mut row: ScheduledNotification,
        now: DateTime<Utc>,
        err: &EngineError,
    ) -> ItemOutcome {
        if row.has_attempts_left() {
            row.status = ScheduleStatus::Scheduled;
            row.next_attempt_at =
                Some(now + chrono::Duration::seconds(row.retry_interval_seconds as i64));
            row.error_details = Some(err.to_string());
            SchedulerMetrics::record_retry();

            tracing::info!(
                schedule_id = %row.id,
                attempts = row.attempts,
                max_attempts = row.max_attempts,
                next_attempt_at = ?row.next_attempt_at,
                "Delivery failed, retry scheduled"
            );

            if let Err(update_err) = self.store.update(row).await {
                tracing::error!(error = %update_err, "Failed to persist retry bookkeeping");
            }
        } else {
            SchedulerMetrics::record_exhausted();
            tracing::warn!(
                schedule_id = %row.id,
                attempts = row.attempts,
                "Retry budget exhausted, schedule failed"
            );
            self.finish(row, ScheduleStatus::Failed, Some(err.to_string()))
                .await;
        }

        ItemOutcome::Failed
    }

    /// Move a claimed row to a terminal status.
    async fn finish(
        &self,
        mut row: ScheduledNotification,
        status: ScheduleStatus,
        error_details: Option<String>,
    ) {
        row.status = status;
        row.next_attempt_at = None;
        row.error_details = error_details;
        if let Err(err) = self.store.update(row).await {
            tracing::error!(error = %err, "Failed to persist schedule status");
        }
    }

    async fn load(&self, id: Uuid) -> Result<ScheduledNotification> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("schedule {id}")))
    }
}

impl CycleResult {
    fn tally(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Success => {
                self.processed += 1;
                self.successful += 1;
            }
            ItemOutcome::Failed => {
                self.processed += 1;
                self.failed += 1;
            }
            ItemOutcome::Skipped => {}
        }
    }
}
