use async_trait::async_trait;

use crate::postgres::PostgresPool;

use super::{IdentityResolver, ResolveError};

const SELECT_USER: &str = r#"SELECT "fullName", "isActive" FROM users WHERE id::text = $1"#;

/// Resolves identities against the `users` table
pub struct PgUserDirectory {
    pool: PostgresPool,
}

impl PgUserDirectory {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityResolver for PgUserDirectory {
    async fn resolve(&self, identity: &str) -> Result<String, ResolveError> {
        let row: Option<(String, bool)> = sqlx::query_as(SELECT_USER)
            .bind(identity)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| ResolveError::Backend(e.to_string()))?;

        match row {
            Some((full_name, true)) => Ok(full_name),
            Some((_, false)) => {
                tracing::debug!(identity = %identity, "Inactive user refused");
                Err(ResolveError::UnknownIdentity(identity.to_string()))
            }
            None => Err(ResolveError::UnknownIdentity(identity.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
