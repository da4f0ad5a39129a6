use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
    /// Database URL (for logging purposes)
    database_url: String,
}

impl PostgresPool {
    /// Create a new PostgreSQL pool from configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        tracing::info!(
            pool_size = config.pool_size,
            "PostgreSQL connection pool created"
        );

        Ok(Self {
            pool,
            database_url: config.url.clone(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the database URL (masked for logging).
    pub fn database_url_masked(&self) -> String {
        mask_url(&self.database_url)
    }
}

fn mask_url(url: &str) -> String {
    // Only the userinfo part, between "://" and "@", can hold a password
    let userinfo_start = url.find("://").map(|pos| pos + 3).unwrap_or(0);
    let authority = &url[userinfo_start..];
    if let Some(at_pos) = authority.find('@') {
        if let Some(colon_pos) = authority[..at_pos].find(':') {
            let prefix = &url[..userinfo_start + colon_pos + 1];
            let suffix = &authority[at_pos..];
            return format!("{}***{}", prefix, suffix);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_url_hides_password() {
        assert_eq!(
            mask_url("postgres://app:secret@db:5432/users"),
            "postgres://app:***@db:5432/users"
        );
    }

    #[test]
    fn test_mask_url_without_credentials() {
        assert_eq!(mask_url("postgres://db:5432/users"), "postgres://db:5432/users");
    }

    #[test]
    fn test_mask_url_user_without_password() {
        assert_eq!(mask_url("postgres://app@db/users"), "postgres://app@db/users");
        assert_eq!(
            mask_url("postgres://app@db:5432/users"),
            "postgres://app@db:5432/users"
        );
    }
}
