//! Notification template system.
//!
//! This module provides:
//! - Template definition with typed `{{variable}}` placeholders and a strict
//!   `{type}_{channel}_{purpose}` naming contract
//! - Save-time validation (balanced delimiters, variable schemas, channel
//!   requirements)
//! - A pure rendering engine with required-variable and runtime type checks
//! - In-memory template storage with CRUD and preview operations
//!
//! # Example
//!
//! ```ignore
//! let store = TemplateStore::new();
//!
//! let template = Template::new(
//!     "order-confirmation",
//!     "order_email_confirmation",
//!     NotificationType::Order,
//!     Channel::Email,
//!     Some("Order {{order_id}} confirmed".to_string()),
//!     "Hi {{customer}}, order {{order_id}} is confirmed.".to_string(),
//! )
//! .with_variable("order_id", VariableType::String, true)
//! .with_variable("customer", VariableType::String, true);
//!
//! store.create(template)?;
//!
//! let rendered = store.preview(
//!     "order-confirmation",
//!     &HashMap::from([
//!         ("order_id".to_string(), json!("ORD-123")),
//!         ("customer".to_string(), json!("Alice")),
//!     ]),
//! )?;
//! ```

mod engine;
mod store;
mod types;

pub use engine::{render, validate, Rendered};
pub use store::{TemplateStore, UpdateTemplateRequest};
pub use types::{Template, TemplateError, TemplateResult, VariableSpec, VariableType};
