//! Cross-component integration tests
//!
//! These tests wire the real components together (manager, scheduler,
//! templates, preferences, history) against an in-process scripted provider
//! gateway, without any external services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::broadcast;

use courier_engine::config::SchedulerConfig;
use courier_engine::error::EngineError;
use courier_engine::history::{is_valid_transition, HistoryLedger, MemoryHistoryStore};
use courier_engine::notification::{
    CreateNotificationRequest, MemoryNotificationStore, NotificationManager, NotificationStatus,
};
use courier_engine::preference::{
    Channel, Frequency, MemoryPreferenceStore, NotificationType, PreferenceResolver,
    PreferenceUpdate,
};
use courier_engine::provider::{ProviderError, ProviderGateway, ProviderReceipt, ProviderRegistry};
use courier_engine::scheduler::{MemoryScheduleStore, ScheduleStatus, Scheduler};
use courier_engine::template::{Template, TemplateStore, VariableType};

/// Provider gateway scripted with a sequence of outcomes; repeats the last
/// outcome once the script is exhausted.
struct ScriptedGateway {
    outcomes: Vec<Result<ProviderReceipt, String>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    fn new(outcomes: Vec<Result<ProviderReceipt, String>>) -> Self {
        Self {
            outcomes,
            calls: AtomicUsize::new(0),
        }
    }

    fn always_ok(delivered: bool) -> Self {
        Self::new(vec![Ok(ProviderReceipt {
            provider_id: "ext-1".to_string(),
            delivered,
        })])
    }

    fn always_failing() -> Self {
        Self::new(vec![Err("upstream unavailable".to_string())])
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn send(
        &self,
        _recipient: &str,
        _subject: Option<&str>,
        _content: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<ProviderReceipt, ProviderError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .get(index)
            .or_else(|| self.outcomes.last())
            .expect("scripted gateway needs at least one outcome");
        match outcome {
            Ok(receipt) => Ok(receipt.clone()),
            Err(message) => Err(ProviderError::Rejected {
                provider: "scripted",
                message: message.clone(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct TestEnvironment {
    manager: Arc<NotificationManager>,
    scheduler: Arc<Scheduler>,
    templates: Arc<TemplateStore>,
    preferences: Arc<PreferenceResolver>,
    history: Arc<HistoryLedger>,
    gateway: Arc<ScriptedGateway>,
}

/// Create a full test environment with all components wired together.
///
/// `retry_interval_seconds` is kept short so retry paths can be exercised
/// with real sleeps.
fn create_test_environment(gateway: ScriptedGateway) -> TestEnvironment {
    let gateway = Arc::new(gateway);

    let mut registry = ProviderRegistry::new();
    for channel in Channel::ALL {
        registry.register(channel, gateway.clone());
    }

    let templates = Arc::new(TemplateStore::new());
    let preferences = Arc::new(PreferenceResolver::new(Arc::new(
        MemoryPreferenceStore::new(),
    )));
    let history = Arc::new(HistoryLedger::new(Arc::new(MemoryHistoryStore::new())));

    let manager = Arc::new(NotificationManager::new(
        Arc::new(MemoryNotificationStore::new()),
        templates.clone(),
        preferences.clone(),
        history.clone(),
        Arc::new(registry),
    ));

    let scheduler = Arc::new(Scheduler::new(
        Arc::new(MemoryScheduleStore::new()),
        manager.clone(),
        SchedulerConfig {
            poll_interval_seconds: 1,
            batch_size: 100,
            worker_concurrency: 4,
            default_max_attempts: 3,
            default_retry_interval_seconds: 1,
        },
    ));

    TestEnvironment {
        manager,
        scheduler,
        templates,
        preferences,
        history,
        gateway,
    }
}

fn order_email_request(user_id: &str) -> CreateNotificationRequest {
    CreateNotificationRequest::new(
        user_id,
        NotificationType::Order,
        Channel::Email,
        format!("{user_id}@example.com"),
        "Your order has shipped",
    )
    .subject("Order update")
}

fn order_confirmation_template() -> Template {
    Template::new(
        "order-confirmation",
        "order_email_confirmation",
        NotificationType::Order,
        Channel::Email,
        Some("Order {{order_id}} confirmed".to_string()),
        "Hi {{customer}}, order {{order_id}} totalling {{total}} is confirmed.".to_string(),
    )
    .with_variable("order_id", VariableType::String, true)
    .with_variable("customer", VariableType::String, true)
    .with_variable("total", VariableType::String, true)
}

// =============================================================================
// Notification lifecycle
// =============================================================================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_immediate_create_sent_and_delivered() {
        let env = create_test_environment(ScriptedGateway::always_ok(true));

        let notification = env.manager.create(order_email_request("u1")).await.unwrap();

        assert_eq!(notification.status, NotificationStatus::Delivered);
        assert!(notification.sent_at.is_some());
        assert!(notification.delivered_at.is_some());
        assert_eq!(env.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_then_manual_retry() {
        let env = create_test_environment(ScriptedGateway::new(vec![
            Err("first attempt fails".to_string()),
            Ok(ProviderReceipt {
                provider_id: "ext-2".to_string(),
                delivered: false,
            }),
        ]));

        let err = env.manager.create(order_email_request("u1")).await.unwrap_err();
        assert!(matches!(err, EngineError::Provider(_)));

        let failed = &env.manager.list_for_user("u1").await.unwrap()[0];
        assert_eq!(failed.status, NotificationStatus::Failed);

        let recovered = env.manager.retry(failed.id).await.unwrap();
        assert_eq!(recovered.status, NotificationStatus::Sent);
        assert!(recovered.failure_reason.is_none());
        assert_eq!(env.gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn test_history_replay_only_contains_table_transitions() {
        let env = create_test_environment(ScriptedGateway::new(vec![
            Err("outage".to_string()),
            Ok(ProviderReceipt {
                provider_id: "ext-3".to_string(),
                delivered: true,
            }),
        ]));

        // pending -> failed -> pending -> sent -> delivered
        let _ = env.manager.create(order_email_request("u1")).await;
        let id = env.manager.list_for_user("u1").await.unwrap()[0].id;
        env.manager.retry(id).await.unwrap();

        let entries = env.history.by_notification(id).await.unwrap();
        assert!(entries.len() >= 4);

        for window in entries.windows(2) {
            assert!(window[0].timestamp <= window[1].timestamp);
        }
        for entry in &entries {
            if let (Some(from), Some(to)) = (entry.previous_status, entry.new_status) {
                assert!(
                    is_valid_transition(from, to),
                    "illegal transition {from} -> {to} recorded"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_user_history_is_reverse_chronological() {
        let env = create_test_environment(ScriptedGateway::always_ok(false));

        env.manager.create(order_email_request("u1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        env.manager.create(order_email_request("u1")).await.unwrap();

        let entries = env.history.by_user("u1").await.unwrap();
        assert!(!entries.is_empty());
        for window in entries.windows(2) {
            assert!(window[0].timestamp >= window[1].timestamp);
        }
    }
}

// =============================================================================
// Preference gating
// =============================================================================

mod preference_tests {
    use super::*;

    /// Scenario C: promotional/email at its default is denied and nothing is
    /// persisted.
    #[tokio::test]
    async fn test_promotional_email_denied_by_default() {
        let env = create_test_environment(ScriptedGateway::always_ok(false));

        let request = CreateNotificationRequest::new(
            "u1",
            NotificationType::Promotional,
            Channel::Email,
            "u1@example.com",
            "Big sale!",
        );
        let result = env.manager.create(request).await;

        assert!(matches!(
            result,
            Err(EngineError::PreferenceDenied {
                notification_type: NotificationType::Promotional,
                channel: Channel::Email,
                ..
            })
        ));
        assert!(env.manager.list_for_user("u1").await.unwrap().is_empty());
        assert!(env.history.by_user("u1").await.unwrap().is_empty());
        assert_eq!(env.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_opt_in_unblocks_promotional() {
        let env = create_test_environment(ScriptedGateway::always_ok(false));

        env.preferences
            .update_preferences(
                "u1",
                vec![PreferenceUpdate {
                    notification_type: NotificationType::Promotional,
                    channel: Channel::Email,
                    enabled: true,
                    frequency: Frequency::Immediate,
                }],
            )
            .await
            .unwrap();

        let request = CreateNotificationRequest::new(
            "u1",
            NotificationType::Promotional,
            Channel::Email,
            "u1@example.com",
            "Big sale!",
        );
        let notification = env.manager.create(request).await.unwrap();
        assert_eq!(notification.status, NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn test_opt_out_blocks_default_enabled_type() {
        let env = create_test_environment(ScriptedGateway::always_ok(false));

        env.preferences
            .update_preferences(
                "u1",
                vec![PreferenceUpdate {
                    notification_type: NotificationType::Order,
                    channel: Channel::Email,
                    enabled: false,
                    frequency: Frequency::Disabled,
                }],
            )
            .await
            .unwrap();

        let result = env.manager.create(order_email_request("u1")).await;
        assert!(matches!(result, Err(EngineError::PreferenceDenied { .. })));

        // Other users are unaffected.
        assert!(env.manager.create(order_email_request("u2")).await.is_ok());
    }
}

// =============================================================================
// Template rendering
// =============================================================================

mod template_tests {
    use super::*;

    /// Scenario B: rendering with all required variables bound leaves every
    /// substituted value in place and no `{{...}}` markers.
    #[tokio::test]
    async fn test_order_confirmation_render_is_fully_resolved() {
        let env = create_test_environment(ScriptedGateway::always_ok(false));
        env.templates.create(order_confirmation_template()).unwrap();

        let variables = HashMap::from([
            ("order_id".to_string(), json!("ORD-2041")),
            ("customer".to_string(), json!("Alice")),
            ("total".to_string(), json!("$99.50")),
        ]);

        let rendered = env.templates.preview("order-confirmation", &variables).unwrap();

        assert_eq!(
            rendered.subject.as_deref(),
            Some("Order ORD-2041 confirmed")
        );
        assert!(rendered.content.contains("ORD-2041"));
        assert!(rendered.content.contains("Alice"));
        assert!(rendered.content.contains("$99.50"));
        assert!(!rendered.content.contains("{{"));
        assert!(!rendered.content.contains("}}"));
    }

    #[tokio::test]
    async fn test_templated_notification_end_to_end() {
        let env = create_test_environment(ScriptedGateway::always_ok(false));
        env.templates.create(order_confirmation_template()).unwrap();

        let request = CreateNotificationRequest::from_template(
            "u1",
            NotificationType::Order,
            Channel::Email,
            "u1@example.com",
            "order-confirmation",
            HashMap::from([
                ("order_id".to_string(), json!("ORD-7")),
                ("customer".to_string(), json!("Bob")),
                ("total".to_string(), json!("$12.00")),
            ]),
        );

        let notification = env.manager.create(request).await.unwrap();
        assert_eq!(notification.subject.as_deref(), Some("Order ORD-7 confirmed"));
        assert_eq!(
            notification.content,
            "Hi Bob, order ORD-7 totalling $12.00 is confirmed."
        );
    }

    #[tokio::test]
    async fn test_missing_required_variable_is_validation_error() {
        let env = create_test_environment(ScriptedGateway::always_ok(false));
        env.templates.create(order_confirmation_template()).unwrap();

        let request = CreateNotificationRequest::from_template(
            "u1",
            NotificationType::Order,
            Channel::Email,
            "u1@example.com",
            "order-confirmation",
            HashMap::from([("order_id".to_string(), json!("ORD-7"))]),
        );

        let result = env.manager.create(request).await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert!(env.manager.list_for_user("u1").await.unwrap().is_empty());
    }
}

// =============================================================================
// Scheduler
// =============================================================================

mod scheduler_tests {
    use super::*;

    /// Scenario A shape: a schedule with maxAttempts=2 whose provider fails
    /// on both attempts ends terminally failed with the retry bookkeeping
    /// visible after each attempt.
    #[tokio::test]
    async fn test_two_failed_attempts_exhaust_the_budget() {
        let env = create_test_environment(ScriptedGateway::always_failing());

        let row = env
            .scheduler
            .schedule(
                order_email_request("u1"),
                Utc::now() + chrono::Duration::milliseconds(100),
                Some(2),
                Some(1),
            )
            .await
            .unwrap();

        // Attempt 1
        tokio::time::sleep(Duration::from_millis(150)).await;
        let result = env.scheduler.run_cycle().await;
        assert_eq!(result.processed, 1);
        assert_eq!(result.failed, 1);

        let after_first = env.scheduler.get(row.id).await.unwrap();
        assert_eq!(after_first.status, ScheduleStatus::Scheduled);
        assert_eq!(after_first.attempts, 1);
        let last = after_first.last_attempt_at.unwrap();
        assert_eq!(
            after_first.next_attempt_at.unwrap(),
            last + chrono::Duration::seconds(1)
        );

        // Attempt 2: budget exhausted.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let result = env.scheduler.run_cycle().await;
        assert_eq!(result.failed, 1);

        let after_second = env.scheduler.get(row.id).await.unwrap();
        assert_eq!(after_second.status, ScheduleStatus::Failed);
        assert_eq!(after_second.attempts, 2);
        assert!(after_second.next_attempt_at.is_none());
        assert!(after_second.error_details.is_some());
        assert_eq!(env.gateway.call_count(), 2);

        // The underlying notification ends failed as well.
        let notification = env.manager.get(row.notification_id).await.unwrap();
        assert_eq!(notification.status, NotificationStatus::Failed);
    }

    #[tokio::test]
    async fn test_scheduled_notification_dispatches_when_due() {
        let env = create_test_environment(ScriptedGateway::always_ok(false));

        let row = env
            .scheduler
            .schedule(
                order_email_request("u1"),
                Utc::now() + chrono::Duration::milliseconds(100),
                None,
                None,
            )
            .await
            .unwrap();

        // Not yet due: nothing happens.
        let result = env.scheduler.run_cycle().await;
        assert_eq!(result.processed, 0);
        assert_eq!(env.gateway.call_count(), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let result = env.scheduler.run_cycle().await;
        assert_eq!(result.processed, 1);
        assert_eq!(result.successful, 1);

        let row = env.scheduler.get(row.id).await.unwrap();
        assert_eq!(row.status, ScheduleStatus::Sent);

        let notification = env.manager.get(row.notification_id).await.unwrap();
        assert_eq!(notification.status, NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn test_failed_first_attempt_recovers_on_retry() {
        let env = create_test_environment(ScriptedGateway::new(vec![
            Err("transient".to_string()),
            Ok(ProviderReceipt {
                provider_id: "ext-9".to_string(),
                delivered: false,
            }),
        ]));

        let row = env
            .scheduler
            .schedule(
                order_email_request("u1"),
                Utc::now() + chrono::Duration::milliseconds(100),
                Some(3),
                Some(1),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        env.scheduler.run_cycle().await;

        // The failed notification was retried back to pending for the next
        // attempt by the scheduler path.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let result = env.scheduler.run_cycle().await;
        assert_eq!(result.successful, 1);

        let row = env.scheduler.get(row.id).await.unwrap();
        assert_eq!(row.status, ScheduleStatus::Sent);
        assert_eq!(row.attempts, 2);
    }

    #[tokio::test]
    async fn test_background_loop_delivers_scheduled_notification() {
        let env = create_test_environment(ScriptedGateway::always_ok(false));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(env.scheduler.clone().run(shutdown_rx));

        let row = env
            .scheduler
            .schedule(
                order_email_request("u1"),
                Utc::now() + chrono::Duration::milliseconds(200),
                None,
                None,
            )
            .await
            .unwrap();

        // Poll interval is 1s; give the loop time for at least two ticks.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Scheduler loop should stop")
            .expect("Scheduler loop should not panic");

        let row = env.scheduler.get(row.id).await.unwrap();
        assert_eq!(row.status, ScheduleStatus::Sent);
        assert_eq!(env.gateway.call_count(), 1);
    }
}
