//! Template validation and rendering.
//!
//! Both operations are pure: they read the template and the supplied
//! variables and produce either output or an error, with no side effects.

use std::collections::HashMap;

use crate::preference::Channel;

use super::types::{Template, TemplateError, TemplateResult};

/// Output of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: Option<String>,
    pub content: String,
}

/// Validate a template for saving.
///
/// Rejects malformed ids, names that do not follow the
/// `{type}_{channel}_{purpose}` contract, a missing subject on email
/// templates, and unbalanced placeholder delimiters in content or subject.
pub fn validate(template: &Template) -> TemplateResult<()> {
    if template.id.is_empty() || template.id.len() > 64 {
        return Err(TemplateError::Invalid(
            "ID must be 1-64 characters".to_string(),
        ));
    }
    if !template
        .id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(TemplateError::Invalid(
            "ID must contain only alphanumeric, dash, or underscore".to_string(),
        ));
    }

    let prefix = template.expected_name_prefix();
    let purpose = template.name.strip_prefix(&prefix).ok_or_else(|| {
        TemplateError::Invalid(format!(
            "Name '{}' must start with '{}'",
            template.name, prefix
        ))
    })?;
    if purpose.is_empty() {
        return Err(TemplateError::Invalid(
            "Name is missing the purpose segment".to_string(),
        ));
    }
    if !purpose.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(TemplateError::Invalid(format!(
            "Purpose segment '{purpose}' must be alphanumeric or underscore"
        )));
    }

    if template.channel == Channel::Email
        && template.subject.as_deref().map_or(true, str::is_empty)
    {
        return Err(TemplateError::Invalid(
            "Email templates require a subject".to_string(),
        ));
    }

    for name in template.variables.keys() {
        if name.is_empty() {
            return Err(TemplateError::Invalid(
                "Variable names must not be empty".to_string(),
            ));
        }
    }

    scan_placeholders(&template.content)?;
    if let Some(subject) = &template.subject {
        scan_placeholders(subject)?;
    }

    Ok(())
}

/// Render a template with the supplied variables.
///
/// Fails with a validation-class error when a required variable is absent or
/// a present variable's runtime type does not match its declared schema, and
/// with `Unresolved` when any `{{...}}` remains after substitution.
pub fn render(
    template: &Template,
    variables: &HashMap<String, serde_json::Value>,
) -> TemplateResult<Rendered> {
    for (name, spec) in &template.variables {
        match variables.get(name) {
            None if spec.required => {
                return Err(TemplateError::MissingVariable(name.clone()));
            }
            Some(value) if !spec.var_type.matches(value) => {
                return Err(TemplateError::TypeMismatch {
                    variable: name.clone(),
                    expected: spec.var_type,
                    actual: json_type_name(value),
                });
            }
            _ => {}
        }
    }

    let content = substitute(&template.content, variables);
    let subject = template.subject.as_ref().map(|s| substitute(s, variables));

    let mut leftover = scan_placeholders(&content)?;
    if let Some(subject) = &subject {
        leftover.extend(scan_placeholders(subject)?);
    }
    if !leftover.is_empty() {
        leftover.sort();
        leftover.dedup();
        return Err(TemplateError::Unresolved(leftover.join(", ")));
    }

    Ok(Rendered { subject, content })
}

/// Replace every `{{name}}` occurrence with the variable's rendered value.
fn substitute(text: &str, variables: &HashMap<String, serde_json::Value>) -> String {
    let mut result = text.to_string();
    for (name, value) in variables {
        let pattern = format!("{{{{{name}}}}}");
        result = result.replace(&pattern, &value_to_string(value));
    }
    result
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        // Objects and arrays use their JSON representation.
        other => other.to_string(),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Scan text for `{{...}}` placeholders.
///
/// Returns the placeholder names found, or an error for an unclosed `{{` or
/// a stray `}}`.
fn scan_placeholders(text: &str) -> TemplateResult<Vec<String>> {
    let bytes = text.as_bytes();
    let mut names = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(b"{{") {
            let start = i + 2;
            let close = text[start..].find("}}").map(|p| start + p);
            match close {
                Some(end) => {
                    let inner = &text[start..end];
                    if inner.contains("{{") {
                        return Err(TemplateError::Invalid(format!(
                            "Unclosed placeholder before '{{{{{}'",
                            inner.split("{{").next().unwrap_or_default()
                        )));
                    }
                    names.push(inner.trim().to_string());
                    i = end + 2;
                }
                None => {
                    return Err(TemplateError::Invalid(
                        "Unclosed '{{' placeholder delimiter".to_string(),
                    ));
                }
            }
        } else if bytes[i..].starts_with(b"}}") {
            return Err(TemplateError::Invalid(
                "Stray '}}' placeholder delimiter".to_string(),
            ));
        } else {
            i += 1;
        }
    }

    Ok(names)
}
