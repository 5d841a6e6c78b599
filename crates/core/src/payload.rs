//! Typed event payloads carried by notifications.
//!
//! Domain modules attach one of these to a send request. Known event
//! families get a concrete shape; anything else falls back to
//! [`EventPayload::Generic`]. The payload is persisted as the record's
//! `data` column and flattened into template variables at render time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload for order lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub order_id: String,
    pub order_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
}

/// Payload for stock-level events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEvent {
    pub item_id: String,
    pub sku: String,
    pub item_name: String,
    pub current_quantity: f64,
    pub reorder_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
}

/// Payload for equipment breakdown and maintenance events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentEvent {
    pub equipment_id: String,
    pub equipment_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
}

/// Payload for quality inspection events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityEvent {
    pub inspection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Payload for task assignment and deadline events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: String,
    pub task_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Structured data attached to a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Order(OrderEvent),
    Inventory(InventoryEvent),
    Equipment(EquipmentEvent),
    Quality(QualityEvent),
    Task(TaskEvent),
    /// Free-form fields (images, attachments, ad-hoc context).
    Generic {
        #[serde(default)]
        fields: Map<String, Value>,
    },
}

impl EventPayload {
    /// Entity reference as `(entity_type, entity_id)` for notification metadata.
    pub fn entity_ref(&self) -> Option<(&'static str, &str)> {
        match self {
            EventPayload::Order(e) => Some(("order", e.order_id.as_str())),
            EventPayload::Inventory(e) => Some(("inventory_item", e.item_id.as_str())),
            EventPayload::Equipment(e) => Some(("equipment", e.equipment_id.as_str())),
            EventPayload::Quality(e) => Some(("quality_inspection", e.inspection_id.as_str())),
            EventPayload::Task(e) => Some(("task", e.task_id.as_str())),
            EventPayload::Generic { .. } => None,
        }
    }

    /// Flatten the payload into template variables.
    ///
    /// Field names are the camelCase wire names; the `kind` tag is dropped.
    pub fn to_template_data(&self) -> Map<String, Value> {
        if let EventPayload::Generic { fields } = self {
            return fields.clone();
        }
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("kind");
                map
            }
            _ => Map::new(),
        }
    }
}
