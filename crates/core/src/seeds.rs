//! Default templates and the default preference matrix for a tenant.

use serde_json::json;

use crate::channels::Channel;
use crate::notification::NotificationType;
use crate::preference::PreferenceUpsert;
use crate::template::{TemplateVariable, VariableType};
use crate::templates::NewTemplate;
use crate::types::TenantId;

/// Deterministic id for a seeded template so re-seeding never duplicates it.
pub fn seeded_template_id(tenant_id: &TenantId, code: &str) -> String {
    format!("tpl-{tenant_id}-{}", code.replace('_', "-"))
}

fn template(
    code: &str,
    name: &str,
    notification_type: NotificationType,
    channel: Channel,
    subject: &str,
    body: &str,
    variables: Vec<TemplateVariable>,
) -> NewTemplate {
    NewTemplate {
        id: None,
        code: code.to_string(),
        name: name.to_string(),
        notification_type,
        channel,
        subject: subject.to_string(),
        body: body.to_string(),
        variables,
        is_active: true,
        styling: None,
        metadata: None,
    }
}

/// Built-in templates seeded for a new tenant. Codes are unique per tenant.
pub fn default_templates() -> Vec<NewTemplate> {
    use NotificationType::*;
    use VariableType as V;

    vec![
        template(
            "order_created",
            "Order created",
            OrderCreated,
            Channel::Email,
            "Order {{orderNumber}} created",
            "Order {{orderNumber}}{{#if customerName}} for {{customerName}}{{/if}} has been created.\
             {{#if totalAmount}} Total: {{formatCurrency totalAmount currency}}.{{/if}}",
            vec![
                TemplateVariable::required("orderNumber", V::String),
                TemplateVariable::optional("customerName", V::String, None),
                TemplateVariable::optional("totalAmount", V::Number, None),
                TemplateVariable::optional("currency", V::String, Some(json!("USD"))),
            ],
        ),
        template(
            "order_delayed",
            "Order delayed",
            OrderDelayed,
            Channel::Email,
            "Order {{orderNumber}} is delayed",
            "Order {{orderNumber}} will miss its due date{{#if dueDate}} of {{formatDate dueDate \"%Y-%m-%d\"}}{{/if}}.\
             {{#if delayReason}} Reason: {{delayReason}}.{{/if}}",
            vec![
                TemplateVariable::required("orderNumber", V::String),
                TemplateVariable::optional("dueDate", V::Date, None),
                TemplateVariable::optional("delayReason", V::String, None),
            ],
        ),
        template(
            "inventory_low_stock",
            "Inventory low stock",
            InventoryLowStock,
            Channel::InApp,
            "Low stock: {{itemName}}",
            "{{sku}} is at {{formatNumber currentQuantity}} {{default unit \"units\"}} \
             (reorder level {{formatNumber reorderLevel}}){{#if warehouse}} in {{warehouse}}{{/if}}.",
            vec![
                TemplateVariable::required("itemName", V::String),
                TemplateVariable::required("sku", V::String),
                TemplateVariable::required("currentQuantity", V::Number),
                TemplateVariable::required("reorderLevel", V::Number),
                TemplateVariable::optional("unit", V::String, None),
                TemplateVariable::optional("warehouse", V::String, None),
            ],
        ),
        template(
            "equipment_breakdown",
            "Equipment breakdown",
            EquipmentBreakdown,
            Channel::InApp,
            "{{uppercase equipmentName}} is down",
            "{{equipmentName}}{{#if location}} at {{location}}{{/if}} reported a breakdown.\
             {{#if description}} {{description}}{{/if}}",
            vec![
                TemplateVariable::required("equipmentName", V::String),
                TemplateVariable::optional("location", V::String, None),
                TemplateVariable::optional("description", V::String, None),
            ],
        ),
        template(
            "quality_check_failed",
            "Quality check failed",
            QualityCheckFailed,
            Channel::Email,
            "Quality check failed{{#if batchNumber}} for batch {{batchNumber}}{{/if}}",
            "Inspection {{inspectionId}}{{#if productName}} of {{productName}}{{/if}} failed\
             {{#if defectCount}} with {{defectCount}} {{pluralize defectCount \"defect\"}}{{/if}}.",
            vec![
                TemplateVariable::required("inspectionId", V::String),
                TemplateVariable::optional("productName", V::String, None),
                TemplateVariable::optional("batchNumber", V::String, None),
                TemplateVariable::optional("defectCount", V::Number, None),
            ],
        ),
        template(
            "task_assigned",
            "Task assigned",
            TaskAssigned,
            Channel::InApp,
            "New task: {{taskTitle}}",
            "You have been assigned \"{{taskTitle}}\"{{#if dueDate}}, due {{formatDate dueDate}}{{/if}}.",
            vec![
                TemplateVariable::required("taskTitle", V::String),
                TemplateVariable::optional("dueDate", V::Date, None),
            ],
        ),
        template(
            "task_overdue",
            "Task overdue",
            TaskOverdue,
            Channel::Email,
            "Overdue: {{taskTitle}}",
            "\"{{taskTitle}}\" was due {{formatDate dueDate}} and is not complete.",
            vec![
                TemplateVariable::required("taskTitle", V::String),
                TemplateVariable::required("dueDate", V::Date),
            ],
        ),
    ]
}

/// Types important enough to reach users by email out of the box.
const EMAIL_BY_DEFAULT: &[NotificationType] = &[
    NotificationType::OrderDelayed,
    NotificationType::InventoryOutOfStock,
    NotificationType::EquipmentBreakdown,
    NotificationType::QualityCheckFailed,
    NotificationType::TaskAssigned,
    NotificationType::TaskOverdue,
    NotificationType::SystemAlert,
];

/// The preference rows written by "set defaults" for a user.
///
/// In-app and websocket are on for every type, email only for
/// [`EMAIL_BY_DEFAULT`]. SMS, push and webhook are never seeded.
pub fn default_preferences() -> Vec<PreferenceUpsert> {
    let mut rows = Vec::new();
    for t in NotificationType::ALL {
        rows.push(PreferenceUpsert::new(*t, Channel::InApp, true));
        rows.push(PreferenceUpsert::new(*t, Channel::WebSocket, true));
        rows.push(PreferenceUpsert::new(*t, Channel::Email, EMAIL_BY_DEFAULT.contains(t)));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_templates_compile_and_have_unique_codes() {
        let templates = default_templates();
        let codes: HashSet<_> = templates.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes.len(), templates.len());
        for t in &templates {
            t.validate().unwrap_or_else(|e| panic!("{} invalid: {e}", t.code));
        }
    }

    #[test]
    fn preference_matrix_covers_every_type() {
        let rows = default_preferences();
        assert_eq!(rows.len(), NotificationType::ALL.len() * 3);
        assert!(rows
            .iter()
            .filter(|r| r.channel == Channel::InApp)
            .all(|r| r.enabled));
        assert!(!rows
            .iter()
            .any(|r| matches!(r.channel, Channel::Sms | Channel::Push | Channel::Webhook)));
    }

    #[test]
    fn seeded_ids_are_stable() {
        assert_eq!(
            seeded_template_id(&"t1".to_string(), "order_created"),
            "tpl-t1-order-created"
        );
    }
}
