//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    NOTIFICATIONS_DELIVERED_TOTAL, NOTIFICATIONS_DENIED_TOTAL, NOTIFICATIONS_FAILED_TOTAL,
    NOTIFICATIONS_SENT_TOTAL, SCHEDULER_CYCLES_TOTAL, SCHEDULER_FAILED_TOTAL,
    SCHEDULER_PROCESSED_TOTAL, SCHEDULER_SUCCESSFUL_TOTAL, SCHEDULES_CREATED_TOTAL,
    SCHEDULE_EXHAUSTED_TOTAL, SCHEDULE_RETRIES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a notification accepted by a provider
    pub fn record_sent(channel: &str) {
        NOTIFICATIONS_SENT_TOTAL.with_label_values(&[channel]).inc();
    }

    /// Record a synchronous delivery confirmation
    pub fn record_delivered(channel: &str) {
        NOTIFICATIONS_DELIVERED_TOTAL
            .with_label_values(&[channel])
            .inc();
    }

    /// Record a failed delivery attempt
    pub fn record_failed(channel: &str) {
        NOTIFICATIONS_FAILED_TOTAL
            .with_label_values(&[channel])
            .inc();
    }

    /// Record a notification blocked by user preference
    pub fn record_denied(channel: &str) {
        NOTIFICATIONS_DENIED_TOTAL
            .with_label_values(&[channel])
            .inc();
    }
}

/// Helper struct for recording scheduler metrics
pub struct SchedulerMetrics;

impl SchedulerMetrics {
    /// Record a newly created schedule row
    pub fn record_scheduled() {
        SCHEDULES_CREATED_TOTAL.inc();
    }

    /// Record a retry queued after a failed attempt
    pub fn record_retry() {
        SCHEDULE_RETRIES_TOTAL.inc();
    }

    /// Record a schedule that exhausted its retry budget
    pub fn record_exhausted() {
        SCHEDULE_EXHAUSTED_TOTAL.inc();
    }

    /// Record the aggregate result of one poll cycle
    pub fn record_cycle(processed: usize, successful: usize, failed: usize) {
        SCHEDULER_CYCLES_TOTAL.inc();
        SCHEDULER_PROCESSED_TOTAL.inc_by(processed as u64);
        SCHEDULER_SUCCESSFUL_TOTAL.inc_by(successful as u64);
        SCHEDULER_FAILED_TOTAL.inc_by(failed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_contains_prefix() {
        DispatchMetrics::record_sent("email");
        SchedulerMetrics::record_cycle(1, 1, 0);

        let output = encode_metrics().unwrap();
        assert!(output.contains("courier_notifications_sent_total"));
        assert!(output.contains("courier_scheduler_cycles_total"));
    }
}
