//! Read-only access to the externally owned `users` and `tenant_members` tables.

use sqlx::PgPool;

/// Resolves role membership and contact addresses.
pub struct DirectoryRepo;

impl DirectoryRepo {
    /// Active members of a tenant holding `role`.
    pub async fn users_with_role(
        pool: &PgPool,
        tenant_id: &str,
        role: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM tenant_members \
             WHERE tenant_id = $1 AND role = $2 AND is_active \
             ORDER BY user_id",
        )
        .bind(tenant_id)
        .bind(role)
        .fetch_all(pool)
        .await
    }

    /// The user's email address, if the user exists and has one.
    pub async fn email_of(pool: &PgPool, user_id: &str) -> Result<Option<String>, sqlx::Error> {
        let email: Option<Option<String>> =
            sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(email.flatten())
    }
}
