//! Template storage with a compiled-template cache.
//!
//! Compiled subject/body pairs are cached by template id behind a
//! `parking_lot::RwLock`. Entries are replaced whole, so readers see either
//! the old or the new compilation. Update and delete evict explicitly; an
//! entry whose `updated_at` no longer matches the stored row is recompiled
//! as well, which covers writes made by other processes.

use std::collections::HashMap;
use std::sync::Arc;

use mfgops_core::error::CoreError;
use mfgops_core::seeds::{default_templates, seeded_template_id};
use mfgops_core::template::{self, apply_defaults, missing_required, CompiledTemplate, RenderedContent};
use mfgops_core::templates::{NewTemplate, NotificationTemplate, TemplateFilter, TemplateUpdate};
use mfgops_core::types::{TemplateId, Timestamp};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{NotifyError, StoreError};
use crate::store::TemplateStore;

struct Compiled {
    updated_at: Timestamp,
    subject: CompiledTemplate,
    body: CompiledTemplate,
}

pub struct TemplateService {
    store: Arc<dyn TemplateStore>,
    cache: RwLock<HashMap<TemplateId, Arc<Compiled>>>,
}

impl TemplateService {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, tenant_id: &str, input: &NewTemplate) -> Result<NotificationTemplate, NotifyError> {
        input.validate()?;
        let id = input
            .id
            .clone()
            .unwrap_or_else(|| format!("tpl-{}", uuid::Uuid::new_v4()));
        match self.store.create(tenant_id, &id, input).await {
            Ok(template) => {
                tracing::info!(tenant_id, template_id = %template.id, code = %template.code, "Template created");
                Ok(template)
            }
            Err(StoreError::Duplicate(_)) => Err(CoreError::Conflict(format!(
                "Template '{id}' or code '{}' already exists",
                input.code
            ))
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        input: &TemplateUpdate,
    ) -> Result<NotificationTemplate, NotifyError> {
        input.validate()?;
        let updated = self
            .store
            .update(tenant_id, id, input)
            .await?
            .ok_or_else(|| CoreError::not_found("NotificationTemplate", id))?;
        self.evict(id);
        Ok(updated)
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> Result<NotificationTemplate, NotifyError> {
        self.store
            .find_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| CoreError::not_found("NotificationTemplate", id).into())
    }

    pub async fn get_by_code(&self, tenant_id: &str, code: &str) -> Result<NotificationTemplate, NotifyError> {
        self.store
            .find_by_code(tenant_id, code)
            .await?
            .ok_or_else(|| CoreError::not_found("NotificationTemplate", code).into())
    }

    /// Active templates of the tenant, ordered by code.
    pub async fn list(&self, tenant_id: &str, filter: &TemplateFilter) -> Result<Vec<NotificationTemplate>, NotifyError> {
        Ok(self.store.list_active(tenant_id, filter).await?)
    }

    pub async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), NotifyError> {
        if !self.store.delete(tenant_id, id).await? {
            return Err(CoreError::not_found("NotificationTemplate", id).into());
        }
        self.evict(id);
        Ok(())
    }

    /// Whether `source` compiles.
    pub fn validate(&self, source: &str) -> bool {
        template::validate(source)
    }

    /// Render a stored template.
    ///
    /// Declared defaults fill absent keys; caller data wins otherwise.
    /// Fails only when a required variable is still missing.
    pub fn render(
        &self,
        template: &NotificationTemplate,
        data: &Map<String, Value>,
    ) -> Result<RenderedContent, NotifyError> {
        let merged = apply_defaults(&template.variables, data);
        let missing = missing_required(&template.variables, &merged);
        if !missing.is_empty() {
            return Err(NotifyError::validation(format!(
                "Template '{}' is missing required variables: {}",
                template.code,
                missing.join(", ")
            )));
        }
        let compiled = self.compiled(template)?;
        Ok(RenderedContent {
            subject: compiled.subject.render(&merged),
            body: compiled.body.render(&merged),
        })
    }

    pub async fn render_by_id(
        &self,
        tenant_id: &str,
        id: &str,
        data: &Map<String, Value>,
    ) -> Result<RenderedContent, NotifyError> {
        let template = self.get(tenant_id, id).await?;
        self.render(&template, data)
    }

    /// Insert the default templates the tenant does not have yet.
    pub async fn seed_defaults(&self, tenant_id: &str) -> Result<u64, NotifyError> {
        let tenant = tenant_id.to_string();
        let mut inserted = 0;
        for input in default_templates() {
            let id = seeded_template_id(&tenant, &input.code);
            if self.store.insert_if_absent(tenant_id, &id, &input).await? {
                inserted += 1;
            }
        }
        tracing::info!(tenant_id, inserted, "Default templates seeded");
        Ok(inserted)
    }

    /// Number of cached compilations.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    fn evict(&self, id: &str) {
        self.cache.write().remove(id);
    }

    fn compiled(&self, template: &NotificationTemplate) -> Result<Arc<Compiled>, NotifyError> {
        if let Some(entry) = self.cache.read().get(&template.id) {
            if entry.updated_at == template.updated_at {
                return Ok(Arc::clone(entry));
            }
        }

        let compile = |field: &str, source: &str| {
            template::compile(source).map_err(|e| {
                NotifyError::validation(format!("Template '{}' {field} does not compile: {e}", template.code))
            })
        };
        let entry = Arc::new(Compiled {
            updated_at: template.updated_at,
            subject: compile("subject", &template.subject)?,
            body: compile("body", &template.body)?,
        });
        self.cache.write().insert(template.id.clone(), Arc::clone(&entry));
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTemplateStore;
    use assert_matches::assert_matches;
    use mfgops_core::channels::Channel;
    use mfgops_core::notification::NotificationType;
    use mfgops_core::template::{TemplateVariable, VariableType};
    use serde_json::json;

    fn service() -> TemplateService {
        TemplateService::new(Arc::new(MemoryTemplateStore::new()))
    }

    fn new_template(code: &str, subject: &str) -> NewTemplate {
        NewTemplate {
            id: Some(format!("tpl-{code}")),
            code: code.into(),
            name: "Order created".into(),
            notification_type: NotificationType::OrderCreated,
            channel: Channel::Email,
            subject: subject.into(),
            body: "Customer: {{customerName}}".into(),
            variables: vec![
                TemplateVariable::required("orderNumber", VariableType::String),
                TemplateVariable::optional("customerName", VariableType::String, Some(json!("n/a"))),
            ],
            is_active: true,
            styling: None,
            metadata: None,
        }
    }

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn render_applies_defaults_and_caches() {
        let svc = service();
        svc.create("t1", &new_template("order_created", "Order {{orderNumber}}")).await.unwrap();

        let out = svc
            .render_by_id("t1", "tpl-order_created", &data(json!({"orderNumber": "ORD-001"})))
            .await
            .unwrap();
        assert_eq!(out.subject, "Order ORD-001");
        assert_eq!(out.body, "Customer: n/a");
        assert_eq!(svc.cached_len(), 1);
    }

    #[tokio::test]
    async fn update_invalidates_cached_compilation() {
        let svc = service();
        svc.create("t1", &new_template("order_created", "Order {{orderNumber}}")).await.unwrap();
        let payload = data(json!({"orderNumber": "ORD-9"}));
        svc.render_by_id("t1", "tpl-order_created", &payload).await.unwrap();

        let update = TemplateUpdate {
            subject: Some("New order {{orderNumber}}".into()),
            ..Default::default()
        };
        svc.update("t1", "tpl-order_created", &update).await.unwrap();
        assert_eq!(svc.cached_len(), 0);

        let out = svc.render_by_id("t1", "tpl-order_created", &payload).await.unwrap();
        assert_eq!(out.subject, "New order ORD-9");
    }

    #[tokio::test]
    async fn missing_required_variable_is_rejected() {
        let svc = service();
        svc.create("t1", &new_template("order_created", "Order {{orderNumber}}")).await.unwrap();
        let err = svc
            .render_by_id("t1", "tpl-order_created", &Map::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("orderNumber"));
    }

    #[tokio::test]
    async fn duplicate_code_conflicts() {
        let svc = service();
        svc.create("t1", &new_template("order_created", "A")).await.unwrap();
        let mut again = new_template("order_created", "B");
        again.id = None;
        let err = svc.create("t1", &again).await.unwrap_err();
        assert_matches!(err, NotifyError::Core(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_source_is_rejected_on_create() {
        let svc = service();
        let err = svc
            .create("t1", &new_template("broken", "Order {{#if x}}"))
            .await
            .unwrap_err();
        assert_matches!(err, NotifyError::Core(CoreError::Validation(_)));
        assert!(!svc.validate("{{#each items}}"));
        assert!(svc.validate("{{#each items}}{{this}}{{/each}}"));
    }

    #[tokio::test]
    async fn delete_evicts_and_then_not_found() {
        let svc = service();
        svc.create("t1", &new_template("order_created", "Order {{orderNumber}}")).await.unwrap();
        svc.render_by_id("t1", "tpl-order_created", &data(json!({"orderNumber": "1"})))
            .await
            .unwrap();
        svc.delete("t1", "tpl-order_created").await.unwrap();
        assert_eq!(svc.cached_len(), 0);
        assert_matches!(
            svc.get("t1", "tpl-order_created").await,
            Err(NotifyError::Core(CoreError::NotFound { .. }))
        );
    }

    #[tokio::test]
    async fn templates_are_tenant_scoped() {
        let svc = service();
        svc.create("t1", &new_template("order_created", "Order")).await.unwrap();
        assert!(svc.get("t2", "tpl-order_created").await.is_err());
        assert!(svc.get_by_code("t1", "order_created").await.is_ok());
    }

    #[tokio::test]
    async fn seeding_skips_existing_codes() {
        let svc = service();
        let first = svc.seed_defaults("t1").await.unwrap();
        assert_eq!(first as usize, default_templates().len());
        assert_eq!(svc.seed_defaults("t1").await.unwrap(), 0);
        assert_eq!(
            svc.list("t1", &TemplateFilter::default()).await.unwrap().len(),
            default_templates().len()
        );
    }
}
