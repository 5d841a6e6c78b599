//! Wiring of stores, senders and services into one handle.

use std::sync::Arc;

use mfgops_db::DbPool;

use crate::bus::RealtimeBus;
use crate::config::EngineConfig;
use crate::delivery::{EmailConfig, SenderRegistry};
use crate::dispatch::{BatchResult, Dispatcher, SendRequest};
use crate::error::NotifyError;
use crate::lifecycle::LifecycleService;
use crate::maintenance::Maintenance;
use crate::preferences::PreferenceService;
use crate::scheduler::MaintenanceScheduler;
use crate::store::{
    Directory, MemoryNotificationStore, MemoryPreferenceStore, MemoryTemplateStore, NotificationStore,
    PgDirectory, PgNotificationStore, PgPreferenceStore, PgTemplateStore, PreferenceStore, TemplateStore,
};
use crate::templates::TemplateService;

/// The persistence backends the engine runs on.
#[derive(Clone)]
pub struct Stores {
    pub notifications: Arc<dyn NotificationStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub directory: Arc<dyn Directory>,
}

impl Stores {
    pub fn postgres(pool: DbPool) -> Self {
        Self {
            notifications: Arc::new(PgNotificationStore::new(pool.clone())),
            preferences: Arc::new(PgPreferenceStore::new(pool.clone())),
            templates: Arc::new(PgTemplateStore::new(pool.clone())),
            directory: Arc::new(PgDirectory::new(pool)),
        }
    }

    /// Fresh in-memory stores around the given directory.
    pub fn in_memory(directory: Arc<dyn Directory>) -> Self {
        Self {
            notifications: Arc::new(MemoryNotificationStore::new()),
            preferences: Arc::new(MemoryPreferenceStore::new()),
            templates: Arc::new(MemoryTemplateStore::new()),
            directory,
        }
    }
}

/// Shared handle to every engine service.
#[derive(Clone)]
pub struct Engine {
    pub config: EngineConfig,
    pub bus: Arc<RealtimeBus>,
    pub dispatcher: Arc<Dispatcher>,
    pub lifecycle: Arc<LifecycleService>,
    pub maintenance: Arc<Maintenance>,
    pub preferences: Arc<PreferenceService>,
    pub templates: Arc<TemplateService>,
}

impl Engine {
    /// Build with the standard sender set.
    pub fn new(stores: Stores, config: EngineConfig, email: Option<EmailConfig>, bus: Arc<RealtimeBus>) -> Self {
        let senders = SenderRegistry::standard(Arc::clone(&bus), Arc::clone(&stores.directory), email);
        Self::with_senders(stores, config, senders, bus)
    }

    pub fn with_senders(stores: Stores, config: EngineConfig, senders: SenderRegistry, bus: Arc<RealtimeBus>) -> Self {
        let preferences = Arc::new(PreferenceService::new(
            stores.preferences,
            config.unsubscribe_secret.clone(),
            config.missing_preference_policy,
        ));
        let templates = Arc::new(TemplateService::new(stores.templates));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&stores.notifications),
            Arc::clone(&preferences),
            Arc::clone(&templates),
            stores.directory,
            senders,
            config.dispatch_concurrency,
            config.send_timeout,
        ));
        let lifecycle = Arc::new(LifecycleService::new(Arc::clone(&stores.notifications)));
        let maintenance = Arc::new(Maintenance::new(
            stores.notifications,
            Arc::clone(&dispatcher),
            Arc::clone(&preferences),
        ));

        Self {
            config,
            bus,
            dispatcher,
            lifecycle,
            maintenance,
            preferences,
            templates,
        }
    }

    pub async fn send(&self, request: &SendRequest) -> Result<BatchResult, NotifyError> {
        self.dispatcher.send(request).await
    }

    /// A scheduler over this engine's maintenance using the configured periods.
    pub fn scheduler(&self) -> MaintenanceScheduler {
        MaintenanceScheduler::new(
            Arc::clone(&self.maintenance),
            self.config.sweep_interval,
            self.config.retention_interval,
            self.config.retention_days,
        )
    }
}
