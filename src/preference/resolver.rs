use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{EngineError, Result};

use super::defaults::{default_preference, DEFAULT_MATRIX};
use super::store::PreferenceStore;
use super::types::{
    Channel, EffectivePreference, Frequency, NotificationType, PreferenceUpdate,
    UserNotificationPreference,
};

/// Computes effective delivery gates by merging stored per-user rows over the
/// default matrix, and validates preference updates.
pub struct PreferenceResolver {
    store: Arc<dyn PreferenceStore>,
}

impl PreferenceResolver {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// The complete effective preference set for a user, one entry per
    /// type/channel combination.
    pub async fn effective_preferences(&self, user_id: &str) -> Result<Vec<EffectivePreference>> {
        let stored = self.store.rows_for_user(user_id).await?;

        let merged = DEFAULT_MATRIX
            .iter()
            .map(|default| {
                let row = stored.iter().find(|r| {
                    r.notification_type == default.notification_type
                        && r.channel == default.channel
                });
                match row {
                    Some(r) => EffectivePreference {
                        notification_type: r.notification_type,
                        channel: r.channel,
                        enabled: r.enabled,
                        frequency: r.frequency,
                        explicit: true,
                    },
                    None => EffectivePreference {
                        notification_type: default.notification_type,
                        channel: default.channel,
                        enabled: default.enabled,
                        frequency: default.frequency,
                        explicit: false,
                    },
                }
            })
            .collect();

        Ok(merged)
    }

    /// Whether a notification of the given type may be delivered to the user
    /// on the given channel.
    pub async fn is_allowed(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        channel: Channel,
    ) -> Result<bool> {
        let (enabled, frequency) = match self.store.row(user_id, notification_type, channel).await? {
            Some(row) => (row.enabled, row.frequency),
            None => {
                let default = default_preference(notification_type, channel);
                (default.enabled, default.frequency)
            }
        };

        Ok(enabled && frequency != Frequency::Disabled)
    }

    /// Validate and upsert a batch of preference updates for one user.
    ///
    /// The batch is rejected as a whole on duplicate (type, channel) pairs or
    /// an attempt to disable system/in_app. Frequencies inconsistent with the
    /// enabled flag are auto-corrected rather than rejected.
    pub async fn update_preferences(
        &self,
        user_id: &str,
        updates: Vec<PreferenceUpdate>,
    ) -> Result<Vec<UserNotificationPreference>> {
        if updates.is_empty() {
            return Err(EngineError::Validation(
                "Preference update list is empty".to_string(),
            ));
        }

        let mut seen: HashSet<(NotificationType, Channel)> = HashSet::new();
        let now = Utc::now();
        let mut rows = Vec::with_capacity(updates.len());

        for update in updates {
            if !seen.insert((update.notification_type, update.channel)) {
                return Err(EngineError::Validation(format!(
                    "Duplicate preference entry for {}/{}",
                    update.notification_type, update.channel
                )));
            }

            // system/in_app carries mandatory operational notices and cannot
            // be opted out of.
            if update.notification_type == NotificationType::System
                && update.channel == Channel::InApp
                && (!update.enabled || update.frequency == Frequency::Disabled)
            {
                return Err(EngineError::Validation(
                    "system/in_app notifications cannot be disabled".to_string(),
                ));
            }

            let frequency = Self::corrected_frequency(update.enabled, update.frequency);

            rows.push(UserNotificationPreference {
                user_id: user_id.to_string(),
                notification_type: update.notification_type,
                channel: update.channel,
                enabled: update.enabled,
                frequency,
                updated_at: now,
            });
        }

        self.store.upsert_all(rows.clone()).await?;

        tracing::info!(
            user_id = %user_id,
            updated = rows.len(),
            "Updated notification preferences"
        );

        Ok(rows)
    }

    /// Keep `enabled` and `frequency` mutually consistent.
    fn corrected_frequency(enabled: bool, frequency: Frequency) -> Frequency {
        match (enabled, frequency) {
            (false, _) => Frequency::Disabled,
            (true, Frequency::Disabled) => Frequency::Immediate,
            (true, f) => f,
        }
    }
}
