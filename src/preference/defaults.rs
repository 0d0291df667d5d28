//! Default preference matrix.
//!
//! The matrix is declarative data rather than inline logic so the gating
//! rules can be read, tested, and extended in one place. Promotional
//! notifications default to disabled on every channel (explicit opt-in);
//! everything else defaults to enabled with immediate delivery.

use lazy_static::lazy_static;

use super::types::{Channel, Frequency, NotificationType};

/// One row of the default matrix.
#[derive(Debug, Clone, Copy)]
pub struct DefaultPreference {
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub enabled: bool,
    pub frequency: Frequency,
}

const fn enabled(notification_type: NotificationType, channel: Channel) -> DefaultPreference {
    DefaultPreference {
        notification_type,
        channel,
        enabled: true,
        frequency: Frequency::Immediate,
    }
}

const fn disabled(notification_type: NotificationType, channel: Channel) -> DefaultPreference {
    DefaultPreference {
        notification_type,
        channel,
        enabled: false,
        frequency: Frequency::Disabled,
    }
}

lazy_static! {
    /// The full type x channel default matrix, one row per combination.
    pub static ref DEFAULT_MATRIX: Vec<DefaultPreference> = {
        use Channel::*;
        use NotificationType::*;
        vec![
            enabled(Welcome, Email),
            enabled(Welcome, Sms),
            enabled(Welcome, InApp),
            enabled(Order, Email),
            enabled(Order, Sms),
            enabled(Order, InApp),
            enabled(Payment, Email),
            enabled(Payment, Sms),
            enabled(Payment, InApp),
            enabled(System, Email),
            enabled(System, Sms),
            // system/in_app is the one combination users cannot disable;
            // the resolver enforces that at save time.
            enabled(System, InApp),
            disabled(Promotional, Email),
            disabled(Promotional, Sms),
            disabled(Promotional, InApp),
        ]
    };
}

/// Look up the default for one type/channel combination.
pub fn default_preference(
    notification_type: NotificationType,
    channel: Channel,
) -> DefaultPreference {
    DEFAULT_MATRIX
        .iter()
        .copied()
        .find(|d| d.notification_type == notification_type && d.channel == channel)
        // The matrix enumerates every combination; a miss is a bug in the
        // table itself.
        .unwrap_or(DefaultPreference {
            notification_type,
            channel,
            enabled: true,
            frequency: Frequency::Immediate,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_covers_every_combination() {
        assert_eq!(
            DEFAULT_MATRIX.len(),
            NotificationType::ALL.len() * Channel::ALL.len()
        );
        for ty in NotificationType::ALL {
            for ch in Channel::ALL {
                let row = default_preference(ty, ch);
                assert_eq!(row.notification_type, ty);
                assert_eq!(row.channel, ch);
            }
        }
    }

    #[test]
    fn test_promotional_defaults_disabled() {
        for ch in Channel::ALL {
            let row = default_preference(NotificationType::Promotional, ch);
            assert!(!row.enabled);
            assert_eq!(row.frequency, Frequency::Disabled);
        }
    }

    #[test]
    fn test_system_in_app_default_enabled() {
        let row = default_preference(NotificationType::System, Channel::InApp);
        assert!(row.enabled);
        assert_eq!(row.frequency, Frequency::Immediate);
    }
}
