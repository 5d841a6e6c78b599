//! Notification fan-out engine.
//!
//! - [`Dispatcher`] turns one domain event into per-(recipient, channel)
//!   records, gated by preferences and delivered through [`delivery`]
//!   senders with bounded parallelism.
//! - [`LifecycleService`] applies user-driven transitions (read,
//!   acknowledge, cancel, delete).
//! - [`Maintenance`] runs the retry, expiry, due-dispatch and retention
//!   sweeps; [`MaintenanceScheduler`] drives them periodically.
//! - [`PreferenceService`] and [`TemplateService`] own preference gating and
//!   the compiled-template cache.
//! - [`store`] defines the persistence traits with Postgres and in-memory
//!   implementations.
//! - [`RealtimeBus`] carries events to connected clients.

pub mod bus;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod maintenance;
pub mod preferences;
pub mod scheduler;
pub mod store;
pub mod templates;

pub use bus::{RealtimeBus, RealtimeEvent};
pub use config::{EngineConfig, MissingPreferencePolicy};
pub use delivery::email::{EmailConfig, EmailSender};
pub use dispatch::{BatchResult, Dispatcher, PairResult, SendRequest};
pub use engine::{Engine, Stores};
pub use error::{NotifyError, StoreError};
pub use lifecycle::LifecycleService;
pub use maintenance::{DueReport, Maintenance, RetryReport, SweepKind};
pub use preferences::{Gate, PreferenceService};
pub use scheduler::MaintenanceScheduler;
pub use templates::TemplateService;
