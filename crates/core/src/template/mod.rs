//! Notification template engine.
//!
//! A small, logic-light template language in the Handlebars family:
//!
//! ```text
//! Order {{orderNumber}} is {{#if (gt delayDays 3)}}severely {{/if}}delayed.
//! Total: {{formatCurrency totalAmount "EUR"}} ({{itemCount}} {{pluralize itemCount "line"}})
//! {{#each items}}- {{this.sku}}{{/each}}
//! ```
//!
//! Templates are compiled once into a [`CompiledTemplate`] and rendered any
//! number of times. Rendering never fails and never has side effects:
//! missing variables render as empty strings and helpers given unexpected
//! input fall back to the input's plain string form. Only [`compile`] can
//! fail, and [`validate`] reports that as a boolean.

mod helpers;
mod parser;
mod render;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use helpers::Helper;
pub use parser::TemplateError;

use parser::Node;

/// A parsed template, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    nodes: Vec<Node>,
}

impl CompiledTemplate {
    /// Render against `data`. Deterministic for a given `(template, data)`.
    pub fn render(&self, data: &Map<String, Value>) -> String {
        render::render(&self.nodes, data)
    }
}

/// Compile a template string.
pub fn compile(source: &str) -> Result<CompiledTemplate, TemplateError> {
    let nodes = parser::parse(source)?;
    Ok(CompiledTemplate { nodes })
}

/// Check that a template string compiles, without rendering it.
pub fn validate(source: &str) -> bool {
    compile(source).is_ok()
}

// ---------------------------------------------------------------------------
// Declared variables
// ---------------------------------------------------------------------------

/// Declared type of a template variable. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

/// A variable declared by a stored template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateVariable {
    pub name: String,
    #[serde(default, rename = "type")]
    pub var_type: VariableType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TemplateVariable {
    pub fn required(name: &str, var_type: VariableType) -> Self {
        Self {
            name: name.to_string(),
            var_type,
            required: true,
            default_value: None,
            description: None,
        }
    }

    pub fn optional(name: &str, var_type: VariableType, default_value: Option<Value>) -> Self {
        Self {
            name: name.to_string(),
            var_type,
            required: false,
            default_value,
            description: None,
        }
    }
}

/// Merge declared defaults under caller data.
///
/// Caller-supplied keys always win; a default only fills a key that is
/// absent or `null`.
pub fn apply_defaults(variables: &[TemplateVariable], data: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = data.clone();
    for var in variables {
        let Some(default) = &var.default_value else {
            continue;
        };
        let missing = merged.get(&var.name).map_or(true, Value::is_null);
        if missing {
            merged.insert(var.name.clone(), default.clone());
        }
    }
    merged
}

/// Names of required variables that are still absent (or `null`) in `data`.
pub fn missing_required(variables: &[TemplateVariable], data: &Map<String, Value>) -> Vec<String> {
    variables
        .iter()
        .filter(|v| v.required && data.get(&v.name).map_or(true, Value::is_null))
        .map(|v| v.name.clone())
        .collect()
}

/// Subject and body produced by rendering a stored template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedContent {
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn render(source: &str, value: Value) -> String {
        compile(source).unwrap().render(&data(value))
    }

    // -----------------------------------------------------------------------
    // Interpolation
    // -----------------------------------------------------------------------

    #[test]
    fn interpolates_order_number() {
        assert_eq!(
            render("Order {{orderNumber}}", json!({"orderNumber": "ORD-001"})),
            "Order ORD-001"
        );
    }

    #[test]
    fn missing_variable_renders_empty() {
        assert_eq!(render("[{{nope}}]", json!({})), "[]");
    }

    #[test]
    fn dotted_paths_resolve_nested_objects() {
        let out = render(
            "{{equipment.name}} @ {{equipment.site.code}}",
            json!({"equipment": {"name": "Press 7", "site": {"code": "P1"}}}),
        );
        assert_eq!(out, "Press 7 @ P1");
    }

    #[test]
    fn whitespace_inside_tags_is_ignored() {
        assert_eq!(render("{{  sku  }}", json!({"sku": "A-1"})), "A-1");
    }

    #[test]
    fn numbers_and_booleans_render_plainly() {
        assert_eq!(render("{{q}}/{{ok}}", json!({"q": 12, "ok": true})), "12/true");
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(render("a{{! internal note }}b", json!({})), "ab");
    }

    // -----------------------------------------------------------------------
    // Conditionals
    // -----------------------------------------------------------------------

    #[test]
    fn if_else_on_truthiness() {
        let t = "{{#if urgent}}URGENT{{else}}normal{{/if}}";
        assert_eq!(render(t, json!({"urgent": true})), "URGENT");
        assert_eq!(render(t, json!({"urgent": false})), "normal");
        assert_eq!(render(t, json!({})), "normal");
    }

    #[test]
    fn equality_comparison_in_condition() {
        let t = "{{#if (eq priority \"CRITICAL\")}}!!{{/if}}{{title}}";
        assert_eq!(
            render(t, json!({"priority": "CRITICAL", "title": "Line down"})),
            "!!Line down"
        );
        assert_eq!(render(t, json!({"priority": "LOW", "title": "x"})), "x");
    }

    #[test]
    fn ordering_comparisons_are_numeric() {
        let t = "{{#if (lt qty reorder)}}below{{else}}ok{{/if}}";
        assert_eq!(render(t, json!({"qty": 9, "reorder": 10})), "below");
        assert_eq!(render(t, json!({"qty": 10, "reorder": 10})), "ok");
        // Numeric strings compare as numbers, not lexicographically.
        assert_eq!(render(t, json!({"qty": "9", "reorder": "10"})), "below");
    }

    #[test]
    fn gte_and_ne() {
        assert_eq!(render("{{#if (gte a 3)}}y{{/if}}", json!({"a": 3})), "y");
        assert_eq!(render("{{#if (ne a b)}}y{{/if}}", json!({"a": 1, "b": 1})), "");
    }

    #[test]
    fn unless_inverts() {
        assert_eq!(render("{{#unless ok}}fix{{/unless}}", json!({"ok": false})), "fix");
    }

    #[test]
    fn nested_blocks() {
        let t = "{{#if a}}{{#if b}}ab{{else}}a{{/if}}{{/if}}";
        assert_eq!(render(t, json!({"a": 1, "b": 0})), "a");
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    #[test]
    fn each_iterates_with_this_and_index() {
        let t = "{{#each items}}{{@index}}:{{this.sku}} {{/each}}";
        assert_eq!(
            render(t, json!({"items": [{"sku": "A"}, {"sku": "B"}]})),
            "0:A 1:B "
        );
    }

    #[test]
    fn each_else_on_empty() {
        let t = "{{#each items}}{{this}}{{else}}none{{/each}}";
        assert_eq!(render(t, json!({"items": []})), "none");
    }

    #[test]
    fn each_falls_back_to_root_scope() {
        let t = "{{#each items}}{{this}}-{{unit}} {{/each}}";
        assert_eq!(render(t, json!({"items": [1, 2], "unit": "kg"})), "1-kg 2-kg ");
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    #[test]
    fn case_helpers() {
        assert_eq!(render("{{uppercase s}}", json!({"s": "press"})), "PRESS");
        assert_eq!(render("{{lowercase s}}", json!({"s": "PRESS"})), "press");
        assert_eq!(render("{{capitalize s}}", json!({"s": "press line"})), "Press line");
    }

    #[test]
    fn currency_helper() {
        assert_eq!(
            render("{{formatCurrency amt}}", json!({"amt": 1234.5})),
            "$1,234.50"
        );
        assert_eq!(
            render("{{formatCurrency amt \"EUR\"}}", json!({"amt": -10})),
            "-€10.00"
        );
        assert_eq!(
            render("{{formatCurrency amt \"CHF\"}}", json!({"amt": 5})),
            "CHF 5.00"
        );
    }

    #[test]
    fn number_helper() {
        assert_eq!(render("{{formatNumber n}}", json!({"n": 1234567})), "1,234,567");
        assert_eq!(render("{{formatNumber n 2}}", json!({"n": 0.5})), "0.50");
    }

    #[test]
    fn date_helper() {
        let d = json!({"at": "2026-03-04T05:06:07Z"});
        assert_eq!(render("{{formatDate at}}", d.clone()), "2026-03-04 05:06");
        assert_eq!(render("{{formatDate at \"%d/%m/%Y\"}}", d), "04/03/2026");
        assert_eq!(
            render("{{formatDate at}}", json!({"at": "2026-03-04"})),
            "2026-03-04 00:00"
        );
    }

    #[test]
    fn pluralize_helper() {
        assert_eq!(render("{{pluralize n \"unit\"}}", json!({"n": 1})), "unit");
        assert_eq!(render("{{pluralize n \"unit\"}}", json!({"n": 3})), "units");
        assert_eq!(
            render("{{pluralize n \"batch\" \"batches\"}}", json!({"n": 0})),
            "batches"
        );
    }

    #[test]
    fn default_helper() {
        assert_eq!(render("{{default loc \"n/a\"}}", json!({})), "n/a");
        assert_eq!(render("{{default loc \"n/a\"}}", json!({"loc": "Bay 2"})), "Bay 2");
    }

    #[test]
    fn helper_with_bad_input_falls_back_to_plain_text() {
        assert_eq!(render("{{formatNumber n}}", json!({"n": "lots"})), "lots");
        assert_eq!(render("{{formatDate d}}", json!({"d": "someday"})), "someday");
    }

    #[test]
    fn nested_subexpressions() {
        let t = "{{#if (and (gt qty 0) (lt qty min))}}low{{/if}}";
        assert_eq!(render(t, json!({"qty": 2, "min": 5})), "low");
        assert_eq!(render(t, json!({"qty": 0, "min": 5})), "");
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn validate_accepts_good_templates() {
        assert!(validate("Hello {{name}}"));
        assert!(validate("{{#if (eq a 1)}}x{{else}}y{{/if}}"));
        assert!(validate("no tags at all"));
    }

    #[test]
    fn validate_rejects_syntax_errors() {
        assert!(!validate("Hello {{name"));
        assert!(!validate("{{#if a}}unterminated"));
        assert!(!validate("{{#if a}}x{{/each}}"));
        assert!(!validate("{{/if}}"));
        assert!(!validate("{{else}}"));
        assert!(!validate("{{}}"));
        assert!(!validate("{{shout name}}"));
        assert!(!validate("{{eq a}}"));
        assert!(!validate("{{uppercase \"open}}"));
        assert!(!validate("{{#if (eq a b}}x{{/if}}"));
    }

    #[test]
    fn compile_error_names_the_problem() {
        let err = compile("{{shout name}}").unwrap_err();
        assert!(err.to_string().contains("shout"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let t = compile("{{#each xs}}{{formatNumber this 1}};{{/each}}{{title}}").unwrap();
        let d = data(json!({"xs": [1, 2.26], "title": "T"}));
        assert_eq!(t.render(&d), t.render(&d));
        assert_eq!(t.render(&d), "1.0;2.3;T");
    }

    // -----------------------------------------------------------------------
    // Declared variables
    // -----------------------------------------------------------------------

    #[test]
    fn defaults_fill_only_missing_keys() {
        let vars = vec![
            TemplateVariable::optional("site", VariableType::String, Some(json!("Main plant"))),
            TemplateVariable::optional("shift", VariableType::String, Some(json!("day"))),
        ];
        let merged = apply_defaults(&vars, &data(json!({"shift": "night", "site": null})));
        assert_eq!(merged["site"], "Main plant");
        assert_eq!(merged["shift"], "night");
    }

    #[test]
    fn missing_required_lists_names() {
        let vars = vec![
            TemplateVariable::required("orderNumber", VariableType::String),
            TemplateVariable::required("customer", VariableType::String),
        ];
        let missing = missing_required(&vars, &data(json!({"orderNumber": "ORD-1"})));
        assert_eq!(missing, vec!["customer".to_string()]);
    }
}
