//! In-memory template storage.

use std::collections::HashMap;

use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;

use crate::preference::{Channel, NotificationType};

use super::engine::{render, validate, Rendered};
use super::types::{Template, TemplateError, TemplateResult, VariableSpec};

/// Request to update an existing template.
///
/// Identity fields (id, name, type, channel) are immutable once a template
/// exists; only content, subject, variables, and the active flag may change.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTemplateRequest {
    pub content: Option<String>,

    /// `Some(None)` clears the subject, `Some(Some(..))` replaces it.
    pub subject: Option<Option<String>>,

    pub variables: Option<HashMap<String, VariableSpec>>,

    pub is_active: Option<bool>,
}

/// In-memory template storage.
pub struct TemplateStore {
    templates: DashMap<String, Template>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Validate and store a new template.
    pub fn create(&self, template: Template) -> TemplateResult<Template> {
        validate(&template)?;

        if self.templates.contains_key(&template.id) {
            return Err(TemplateError::AlreadyExists(template.id));
        }

        self.templates.insert(template.id.clone(), template.clone());

        tracing::debug!(
            template_id = %template.id,
            name = %template.name,
            "Template created"
        );

        Ok(template)
    }

    /// Get a template by ID.
    pub fn get(&self, id: &str) -> TemplateResult<Template> {
        self.templates
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// List templates, optionally filtered by type and channel.
    pub fn list(
        &self,
        template_type: Option<NotificationType>,
        channel: Option<Channel>,
    ) -> Vec<Template> {
        self.templates
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|t| template_type.map_or(true, |ty| t.template_type == ty))
            .filter(|t| channel.map_or(true, |ch| t.channel == ch))
            .collect()
    }

    /// Apply a content/subject/variables/is_active update, revalidating the
    /// result before it replaces the stored template.
    pub fn update(&self, id: &str, updates: UpdateTemplateRequest) -> TemplateResult<Template> {
        let mut template = self.get(id)?;

        if let Some(content) = updates.content {
            template.content = content;
        }
        if let Some(subject) = updates.subject {
            template.subject = subject;
        }
        if let Some(variables) = updates.variables {
            template.variables = variables;
        }
        if let Some(is_active) = updates.is_active {
            template.is_active = is_active;
        }

        template.updated_at = Utc::now();
        validate(&template)?;

        self.templates.insert(id.to_string(), template.clone());

        Ok(template)
    }

    /// Delete a template by ID.
    pub fn delete(&self, id: &str) -> TemplateResult<()> {
        self.templates
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }

    /// Render a stored template with the given variables.
    ///
    /// Works on inactive templates too, so drafts can be checked before
    /// activation; the notification path enforces `is_active` separately.
    pub fn preview(
        &self,
        id: &str,
        variables: &HashMap<String, serde_json::Value>,
    ) -> TemplateResult<Rendered> {
        let template = self.get(id)?;
        render(&template, variables)
    }
}
