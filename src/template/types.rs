use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EngineError;
use crate::preference::{Channel, NotificationType};

/// Template-specific error type.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid template: {0}")]
    Invalid(String),

    #[error("Missing required variable: {0}")]
    MissingVariable(String),

    #[error("Variable '{variable}' expected {expected}, got {actual}")]
    TypeMismatch {
        variable: String,
        expected: VariableType,
        actual: &'static str,
    },

    #[error("Unresolved placeholders after substitution: {0}")]
    Unresolved(String),
}

impl From<TemplateError> for EngineError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound(id) => EngineError::NotFound(format!("template {id}")),
            TemplateError::Unresolved(names) => EngineError::UnresolvedVariable(names),
            // Everything else is a contract violation in the template or the
            // supplied variables.
            other => EngineError::Validation(other.to_string()),
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Runtime type a template variable must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl VariableType {
    /// Check a JSON value against this declared type.
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            VariableType::String => value.is_string(),
            VariableType::Number => value.is_number(),
            VariableType::Boolean => value.is_boolean(),
            VariableType::Object => value.is_object(),
            VariableType::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VariableType::String => "string",
            VariableType::Number => "number",
            VariableType::Boolean => "boolean",
            VariableType::Object => "object",
            VariableType::Array => "array",
        };
        f.write_str(s)
    }
}

/// Declared schema for one template variable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VariableSpec {
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default)]
    pub required: bool,
}

/// A reusable content template with named variable placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Unique template identifier (alphanumeric, dash, underscore).
    pub id: String,

    /// Template name; must follow `{type}_{channel}_{purpose}` for the
    /// declared type and channel.
    pub name: String,

    /// Notification category this template renders.
    pub template_type: NotificationType,

    /// Channel the template targets.
    pub channel: Channel,

    /// Subject line with placeholders; required when channel is email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Body content with `{{variable}}` placeholders.
    pub content: String,

    /// Declared variable schemas, keyed by variable name.
    #[serde(default)]
    pub variables: HashMap<String, VariableSpec>,

    /// Inactive templates are kept for audit but cannot be rendered through
    /// the notification path.
    pub is_active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Create an active template with no declared variables.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        template_type: NotificationType,
        channel: Channel,
        subject: Option<String>,
        content: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            template_type,
            channel,
            subject,
            content,
            variables: HashMap::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Declare a variable schema (builder-style).
    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        var_type: VariableType,
        required: bool,
    ) -> Self {
        self.variables
            .insert(name.into(), VariableSpec { var_type, required });
        self
    }

    /// The name prefix this template's type and channel mandate.
    pub fn expected_name_prefix(&self) -> String {
        format!("{}_{}_", self.template_type, self.channel)
    }
}
