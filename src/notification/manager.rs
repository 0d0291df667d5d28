use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::history::{HistoryEvent, HistoryLedger};
use crate::metrics::DispatchMetrics;
use crate::preference::PreferenceResolver;
use crate::provider::ProviderRegistry;
use crate::template::{self, TemplateStore};

use super::store::NotificationStore;
use super::types::{CreateNotificationRequest, Notification, NotificationStatus};

/// Creates, sends, retries, and cancels individual notifications.
///
/// Dispatch is serialized per notification id: a manual `send` and a
/// scheduler tick can never both dispatch the same notification, because the
/// status check and the provider call happen under the same per-id mutex.
pub struct NotificationManager {
    store: Arc<dyn NotificationStore>,
    templates: Arc<TemplateStore>,
    preferences: Arc<PreferenceResolver>,
    history: Arc<HistoryLedger>,
    providers: Arc<ProviderRegistry>,
    /// Per-notification-id dispatch guards (status-as-lock substitute for
    /// stores without atomic conditional updates).
    send_guards: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl NotificationManager {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        templates: Arc<TemplateStore>,
        preferences: Arc<PreferenceResolver>,
        history: Arc<HistoryLedger>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            store,
            templates,
            preferences,
            history,
            providers,
            send_guards: DashMap::new(),
        }
    }

    /// Create a notification, and send it immediately unless it is scheduled
    /// for the future.
    ///
    /// Admission is checked against the user's preferences before anything is
    /// persisted: a denied create leaves no record behind.
    #[tracing::instrument(
        name = "notification.create",
        skip(self, request),
        fields(
            user_id = %request.user_id,
            notification_type = %request.notification_type,
            channel = %request.channel
        )
    )]
    pub async fn create(&self, request: CreateNotificationRequest) -> Result<Notification> {
        let (subject, content) = self.resolve_content(&request)?;

        let allowed = self
            .preferences
            .is_allowed(&request.user_id, request.notification_type, request.channel)
            .await?;
        if !allowed {
            DispatchMetrics::record_denied(request.channel.as_str());
            return Err(EngineError::PreferenceDenied {
                user_id: request.user_id,
                notification_type: request.notification_type,
                channel: request.channel,
            });
        }

        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            notification_type: request.notification_type,
            channel: request.channel,
            recipient: request.recipient,
            subject,
            content,
            template_id: request.template_id,
            metadata: request.metadata,
            status: NotificationStatus::Pending,
            scheduled_at: request.scheduled_at,
            sent_at: None,
            delivered_at: None,
            failure_reason: None,
            priority: request.priority,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(notification.clone()).await?;
        self.history
            .append(
                notification.id,
                &notification.user_id,
                HistoryEvent::Created,
                None,
                Some(NotificationStatus::Pending),
                None,
            )
            .await?;

        tracing::info!(
            notification_id = %notification.id,
            scheduled = notification.scheduled_at.is_some(),
            "Notification created"
        );

        // Anything not deferred to the future goes out right away.
        let due_now = notification.scheduled_at.map_or(true, |at| at <= now);
        if due_now {
            return self.send(notification.id).await;
        }

        Ok(notification)
    }

    /// Dispatch a pending notification through its channel's provider.
    ///
    /// On provider success the notification is marked sent; when the provider
    /// confirms delivery synchronously it is additionally marked delivered.
    /// On provider failure it is marked failed and the error is re-raised.
    #[tracing::instrument(name = "notification.send", skip(self), fields(notification_id = %id))]
    pub async fn send(&self, id: Uuid) -> Result<Notification> {
        let guard = self.dispatch_guard(id);
        let _lock = guard.lock().await;

        let mut notification = self.load(id).await?;
        if notification.status != NotificationStatus::Pending {
            return Err(EngineError::InvalidState {
                operation: "send",
                current: notification.status.to_string(),
            });
        }

        // A missing gateway is treated like any other delivery failure, so
        // the row does not stay pending forever on a misconfigured channel.
        let outcome = match self.providers.gateway(notification.channel) {
            Ok(gateway) => {
                let name = gateway.name();
                gateway
                    .send(
                        &notification.recipient,
                        notification.subject.as_deref(),
                        &notification.content,
                        &notification.metadata,
                    )
                    .await
                    .map(|receipt| (receipt, name))
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok((receipt, provider_name)) => {
                notification.status = NotificationStatus::Sent;
                notification.sent_at = Some(Utc::now());
                notification
                    .metadata
                    .insert("provider_id".to_string(), receipt.provider_id.clone());
                self.store.update(notification.clone()).await?;
                self.history
                    .append(
                        id,
                        &notification.user_id,
                        HistoryEvent::Sent,
                        Some(NotificationStatus::Pending),
                        Some(NotificationStatus::Sent),
                        Some(format!("provider={} id={}", provider_name, receipt.provider_id)),
                    )
                    .await?;
                DispatchMetrics::record_sent(notification.channel.as_str());

                if receipt.delivered {
                    notification.status = NotificationStatus::Delivered;
                    notification.delivered_at = Some(Utc::now());
                    self.store.update(notification.clone()).await?;
                    self.history
                        .append(
                            id,
                            &notification.user_id,
                            HistoryEvent::Delivered,
                            Some(NotificationStatus::Sent),
                            Some(NotificationStatus::Delivered),
                            None,
                        )
                        .await?;
                    DispatchMetrics::record_delivered(notification.channel.as_str());
                    self.send_guards.remove(&id);
                }

                tracing::info!(
                    notification_id = %id,
                    provider = provider_name,
                    delivered = receipt.delivered,
                    "Notification dispatched"
                );

                Ok(notification)
            }
            Err(err) => {
                let reason = err.to_string();
                notification.status = NotificationStatus::Failed;
                notification.failure_reason = Some(reason.clone());
                self.store.update(notification.clone()).await?;
                self.history
                    .append(
                        id,
                        &notification.user_id,
                        HistoryEvent::Failed,
                        Some(NotificationStatus::Pending),
                        Some(NotificationStatus::Failed),
                        Some(reason.clone()),
                    )
                    .await?;
                DispatchMetrics::record_failed(notification.channel.as_str());

                tracing::warn!(
                    notification_id = %id,
                    channel = %notification.channel,
                    error = %reason,
                    "Notification dispatch failed"
                );

                Err(EngineError::Provider(err))
            }
        }
    }

    /// Reset a failed notification to pending and dispatch it again.
    #[tracing::instrument(name = "notification.retry", skip(self), fields(notification_id = %id))]
    pub async fn retry(&self, id: Uuid) -> Result<Notification> {
        {
            let guard = self.dispatch_guard(id);
            let _lock = guard.lock().await;

            let mut notification = self.load(id).await?;
            if notification.status != NotificationStatus::Failed {
                return Err(EngineError::InvalidState {
                    operation: "retry",
                    current: notification.status.to_string(),
                });
            }

            notification.status = NotificationStatus::Pending;
            notification.failure_reason = None;
            self.store.update(notification.clone()).await?;
            self.history
                .append(
                    id,
                    &notification.user_id,
                    HistoryEvent::Retried,
                    Some(NotificationStatus::Failed),
                    Some(NotificationStatus::Pending),
                    None,
                )
                .await?;
        }
        // Guard released before dispatch; send re-acquires it.

        self.send(id).await
    }

    /// Cancel a notification that has not been dispatched yet.
    #[tracing::instrument(name = "notification.cancel", skip(self), fields(notification_id = %id))]
    pub async fn cancel(&self, id: Uuid) -> Result<Notification> {
        let guard = self.dispatch_guard(id);
        let _lock = guard.lock().await;

        let mut notification = self.load(id).await?;
        if notification.status != NotificationStatus::Pending {
            return Err(EngineError::InvalidState {
                operation: "cancel",
                current: notification.status.to_string(),
            });
        }

        notification.status = NotificationStatus::Failed;
        notification.failure_reason = Some("Cancelled".to_string());
        self.store.update(notification.clone()).await?;
        self.history
            .append(
                id,
                &notification.user_id,
                HistoryEvent::Failed,
                Some(NotificationStatus::Pending),
                Some(NotificationStatus::Failed),
                Some("Cancelled".to_string()),
            )
            .await?;

        tracing::info!(notification_id = %id, "Notification cancelled");

        Ok(notification)
    }

    /// Load a notification by id.
    pub async fn get(&self, id: Uuid) -> Result<Notification> {
        self.load(id).await
    }

    /// All notifications for a user, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.store.list_for_user(user_id).await
    }

    async fn load(&self, id: Uuid) -> Result<Notification> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("notification {id}")))
    }

    fn dispatch_guard(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.send_guards.entry(id).or_default().clone()
    }

    /// Resolve subject and content, rendering from a template when one is
    /// referenced.
    fn resolve_content(
        &self,
        request: &CreateNotificationRequest,
    ) -> Result<(Option<String>, String)> {
        match &request.template_id {
            Some(template_id) => {
                let tpl = self.templates.get(template_id).map_err(EngineError::from)?;
                if !tpl.is_active {
                    return Err(EngineError::Validation(format!(
                        "Template '{template_id}' is inactive"
                    )));
                }
                if tpl.channel != request.channel {
                    return Err(EngineError::Validation(format!(
                        "Template '{}' targets channel {}, not {}",
                        template_id, tpl.channel, request.channel
                    )));
                }
                let rendered = template::render(&tpl, &request.variables)?;
                Ok((rendered.subject, rendered.content))
            }
            None => {
                let content = request.content.clone().ok_or_else(|| {
                    EngineError::Validation(
                        "Either content or template_id must be provided".to_string(),
                    )
                })?;
                Ok((request.subject.clone(), content))
            }
        }
    }
}
