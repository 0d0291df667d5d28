mod settings;

pub use settings::{EngineConfig, SchedulerConfig, Settings};
