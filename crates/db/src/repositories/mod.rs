//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` as the first argument.

pub mod directory_repo;
pub mod notification_preference_repo;
pub mod notification_repo;
pub mod notification_template_repo;

pub use directory_repo::DirectoryRepo;
pub use notification_preference_repo::NotificationPreferenceRepo;
pub use notification_repo::{NotificationRepo, StatsRow};
pub use notification_template_repo::NotificationTemplateRepo;
