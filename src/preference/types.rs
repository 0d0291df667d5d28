use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery medium for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    InApp,
}

impl Channel {
    /// All channels, in declaration order.
    pub const ALL: [Channel; 3] = [Channel::Email, Channel::Sms, Channel::InApp];

    /// Stable identifier used in template names and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::InApp => "in_app",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a notification, used for preference gating and template naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Welcome,
    Order,
    Payment,
    System,
    Promotional,
}

impl NotificationType {
    /// All types, in declaration order.
    pub const ALL: [NotificationType; 5] = [
        NotificationType::Welcome,
        NotificationType::Order,
        NotificationType::Payment,
        NotificationType::System,
        NotificationType::Promotional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Welcome => "welcome",
            NotificationType::Order => "order",
            NotificationType::Payment => "payment",
            NotificationType::System => "system",
            NotificationType::Promotional => "promotional",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often a user wants to receive a given type/channel combination.
///
/// `Disabled` and `enabled == false` always travel together; the resolver
/// auto-corrects updates that violate this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Immediate,
    Daily,
    Weekly,
    Disabled,
}

/// A stored per-user preference row, unique per (user, type, channel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNotificationPreference {
    pub user_id: String,
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub enabled: bool,
    pub frequency: Frequency,
    pub updated_at: DateTime<Utc>,
}

/// One entry of an `update_preferences` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub enabled: bool,
    #[serde(default)]
    pub frequency: Frequency,
}

/// The effective gate for one type/channel combination, after merging stored
/// rows over the default matrix.
#[derive(Debug, Clone, Serialize)]
pub struct EffectivePreference {
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub enabled: bool,
    pub frequency: Frequency,
    /// False when the value comes from the default matrix rather than a
    /// stored row.
    pub explicit: bool,
}
