//! Prometheus metrics for the notification engine.
//!
//! This module provides metrics for monitoring the engine:
//! - Dispatch metrics (sent, delivered, failed, denied by channel)
//! - Scheduler metrics (cycles, retries, exhausted retry budgets)

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, SchedulerMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "courier";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Notifications successfully handed to a provider, by channel
    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_sent_total", METRIC_PREFIX),
        "Total notifications accepted by a provider",
        &["channel"]
    ).unwrap();

    /// Notifications with synchronous delivery confirmation, by channel
    pub static ref NOTIFICATIONS_DELIVERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_delivered_total", METRIC_PREFIX),
        "Total notifications confirmed delivered",
        &["channel"]
    ).unwrap();

    /// Failed delivery attempts, by channel
    pub static ref NOTIFICATIONS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_failed_total", METRIC_PREFIX),
        "Total failed delivery attempts",
        &["channel"]
    ).unwrap();

    /// Notifications blocked at admission by user preference, by channel
    pub static ref NOTIFICATIONS_DENIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_denied_total", METRIC_PREFIX),
        "Total notifications denied by user preference",
        &["channel"]
    ).unwrap();

    // ============================================================================
    // Scheduler Metrics
    // ============================================================================

    /// Schedule rows created
    pub static ref SCHEDULES_CREATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_schedules_created_total", METRIC_PREFIX),
        "Total notifications scheduled for deferred delivery"
    ).unwrap();

    /// Poll cycles executed
    pub static ref SCHEDULER_CYCLES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_scheduler_cycles_total", METRIC_PREFIX),
        "Total scheduler poll cycles executed"
    ).unwrap();

    /// Schedule rows processed by poll cycles
    pub static ref SCHEDULER_PROCESSED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_scheduler_processed_total", METRIC_PREFIX),
        "Total schedule rows processed by poll cycles"
    ).unwrap();

    /// Attempts that ended with the notification sent
    pub static ref SCHEDULER_SUCCESSFUL_TOTAL: IntCounter = register_int_counter!(
        format!("{}_scheduler_successful_total", METRIC_PREFIX),
        "Total scheduled attempts that succeeded"
    ).unwrap();

    /// Attempts that failed at the provider
    pub static ref SCHEDULER_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_scheduler_failed_total", METRIC_PREFIX),
        "Total scheduled attempts that failed"
    ).unwrap();

    /// Retries queued after a failed attempt
    pub static ref SCHEDULE_RETRIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_schedule_retries_total", METRIC_PREFIX),
        "Total retries queued after failed delivery attempts"
    ).unwrap();

    /// Schedules terminally failed after exhausting their attempt budget
    pub static ref SCHEDULE_EXHAUSTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_schedule_exhausted_total", METRIC_PREFIX),
        "Total schedules that exhausted their retry budget"
    ).unwrap();
}
