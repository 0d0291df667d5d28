//! User notification preferences.
//!
//! Every notification is admission-checked against the owning user's
//! preferences before anything is persisted. Stored rows are merged over a
//! declarative default matrix (one enabled/frequency pair per type and
//! channel combination), so a user with no stored rows still has a complete,
//! well-defined preference set.

mod defaults;
mod resolver;
mod store;
mod types;

pub use defaults::{default_preference, DefaultPreference, DEFAULT_MATRIX};
pub use resolver::PreferenceResolver;
pub use store::{MemoryPreferenceStore, PreferenceStore};
pub use types::{
    Channel, EffectivePreference, Frequency, NotificationType, PreferenceUpdate,
    UserNotificationPreference,
};
