/// Primary keys of rows owned by this service are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Tenant identifiers are issued by the external tenant directory.
pub type TenantId = String;

/// User identifiers are issued by the external user directory.
pub type UserId = String;

/// Template identifiers are stable string keys (e.g. `tpl-order-created`).
pub type TemplateId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
