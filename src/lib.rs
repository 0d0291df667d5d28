// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain layer (business logic)
pub mod history;
pub mod notification;
pub mod preference;
pub mod provider;
pub mod scheduler;
pub mod template;

pub use error::{EngineError, Result};
