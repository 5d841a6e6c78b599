//! Stored notification templates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channels::Channel;
use crate::error::CoreError;
use crate::notification::NotificationType;
use crate::template::{self, TemplateVariable};
use crate::types::{TemplateId, TenantId, Timestamp};

/// Maximum length of a template code.
pub const MAX_CODE_LEN: usize = 100;

/// A tenant-scoped subject/body template pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTemplate {
    pub id: TemplateId,
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub subject: String,
    pub body: String,
    pub variables: Vec<TemplateVariable>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styling: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn default_active() -> bool {
    true
}

/// Create payload for a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<TemplateId>,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub styling: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl NewTemplate {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_code(&self.code)?;
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation("Template name must not be empty".into()));
        }
        validate_source("subject", &self.subject)?;
        validate_source("body", &self.body)?;
        validate_variables(&self.variables)
    }
}

/// Partial update for a template. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub variables: Option<Vec<TemplateVariable>>,
    pub is_active: Option<bool>,
    pub styling: Option<Value>,
    pub metadata: Option<Value>,
}

impl TemplateUpdate {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(subject) = &self.subject {
            validate_source("subject", subject)?;
        }
        if let Some(body) = &self.body {
            validate_source("body", body)?;
        }
        if let Some(vars) = &self.variables {
            validate_variables(vars)?;
        }
        Ok(())
    }

    /// Apply the update to a stored template.
    pub fn apply(&self, template: &mut NotificationTemplate) {
        if let Some(name) = &self.name {
            template.name = name.clone();
        }
        if let Some(subject) = &self.subject {
            template.subject = subject.clone();
        }
        if let Some(body) = &self.body {
            template.body = body.clone();
        }
        if let Some(vars) = &self.variables {
            template.variables = vars.clone();
        }
        if let Some(active) = self.is_active {
            template.is_active = active;
        }
        if self.styling.is_some() {
            template.styling = self.styling.clone();
        }
        if self.metadata.is_some() {
            template.metadata = self.metadata.clone();
        }
    }
}

/// Optional filters for listing active templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFilter {
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    pub channel: Option<Channel>,
}

impl TemplateFilter {
    pub fn matches(&self, template: &NotificationTemplate) -> bool {
        template.is_active
            && self.notification_type.map_or(true, |t| t == template.notification_type)
            && self.channel.map_or(true, |c| c == template.channel)
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

pub fn validate_code(code: &str) -> Result<(), CoreError> {
    if code.is_empty() || code.len() > MAX_CODE_LEN {
        return Err(CoreError::Validation(format!(
            "Template code must be 1-{MAX_CODE_LEN} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(CoreError::Validation(format!(
            "Template code '{code}' may only contain letters, digits, '_', '-' and '.'"
        )));
    }
    Ok(())
}

fn validate_source(field: &str, source: &str) -> Result<(), CoreError> {
    template::compile(source)
        .map(|_| ())
        .map_err(|e| CoreError::Validation(format!("Invalid template {field}: {e}")))
}

fn validate_variables(vars: &[TemplateVariable]) -> Result<(), CoreError> {
    let mut seen = std::collections::HashSet::new();
    for var in vars {
        if var.name.trim().is_empty() {
            return Err(CoreError::Validation("Template variable name must not be empty".into()));
        }
        if !seen.insert(var.name.as_str()) {
            return Err(CoreError::Validation(format!(
                "Template variable '{}' is declared twice",
                var.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::VariableType;

    fn new_template() -> NewTemplate {
        NewTemplate {
            id: None,
            code: "order_created".into(),
            name: "Order created".into(),
            notification_type: NotificationType::OrderCreated,
            channel: Channel::Email,
            subject: "Order {{orderNumber}}".into(),
            body: "Created for {{customerName}}".into(),
            variables: vec![TemplateVariable::required("orderNumber", VariableType::String)],
            is_active: true,
            styling: None,
            metadata: None,
        }
    }

    #[test]
    fn valid_template_passes() {
        assert!(new_template().validate().is_ok());
    }

    #[test]
    fn broken_subject_is_rejected() {
        let mut t = new_template();
        t.subject = "Order {{orderNumber".into();
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn code_charset_is_enforced() {
        assert!(validate_code("inventory.low-stock_v2").is_ok());
        assert!(validate_code("has space").is_err());
        assert!(validate_code("").is_err());
    }

    #[test]
    fn duplicate_variables_are_rejected() {
        let mut t = new_template();
        t.variables.push(TemplateVariable::required("orderNumber", VariableType::String));
        assert!(t.validate().is_err());
    }

    #[test]
    fn missing_active_flag_defaults_to_true() {
        let t: NewTemplate = serde_json::from_value(serde_json::json!({
            "code": "x", "name": "X", "type": "SYSTEM_ALERT", "channel": "IN_APP",
            "subject": "s", "body": "b"
        }))
        .unwrap();
        assert!(t.is_active);
    }
}
