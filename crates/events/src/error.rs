//! Error types for the notification engine.

use mfgops_core::error::CoreError;

use crate::maintenance::SweepKind;

/// Failure of a persistence adapter.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A unique constraint rejected the write.
    #[error("Duplicate value violates unique constraint: {0}")]
    Duplicate(String),

    /// A stored row could not be converted into its domain type.
    #[error("Invalid stored row: {0}")]
    InvalidRow(#[from] CoreError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // PostgreSQL unique constraint violation.
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::Duplicate(constraint);
            }
        }
        StoreError::Database(err)
    }
}

/// Error returned by engine operations to their direct caller.
///
/// Pair-level delivery failures never surface here; they are recorded on
/// the notification and reported in the batch result.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{kind} sweep already running for tenant {tenant_id}")]
    SweepInProgress { kind: SweepKind, tenant_id: String },
}

impl NotifyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        NotifyError::Core(CoreError::Validation(msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_in_progress_message() {
        let err = NotifyError::SweepInProgress {
            kind: SweepKind::Retry,
            tenant_id: "t1".into(),
        };
        assert_eq!(err.to_string(), "retry sweep already running for tenant t1");
    }

    #[test]
    fn core_errors_pass_through_display() {
        let err = NotifyError::from(CoreError::not_found("Notification", 9));
        assert_eq!(err.to_string(), "Entity not found: Notification with id 9");
    }
}
