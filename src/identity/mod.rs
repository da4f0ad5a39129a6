//! Identity resolution: maps an authenticated identity to a display name.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DatabaseConfig, IdentityConfig};
use crate::error::AppError;
use crate::postgres::PostgresPool;

pub use memory::InMemoryUserDirectory;
pub use postgres::PgUserDirectory;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("Identity backend error: {0}")]
    Backend(String),
}

/// Looks up the display name of an identity.
///
/// Unknown and deactivated accounts both resolve to `UnknownIdentity`.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, identity: &str) -> Result<String, ResolveError>;

    /// Backend name for logging and health output
    fn backend_name(&self) -> &'static str;
}

/// Build the identity resolver selected by configuration
pub async fn create_identity_resolver(
    identity: &IdentityConfig,
    database: &DatabaseConfig,
) -> Result<Arc<dyn IdentityResolver>, AppError> {
    match identity.backend.as_str() {
        "memory" => {
            tracing::info!(seeded_users = identity.users.len(), "Using in-memory user directory");
            Ok(Arc::new(InMemoryUserDirectory::from_seeds(&identity.users)))
        }
        "postgres" => {
            let pool = PostgresPool::new(database).await?;
            tracing::info!(database_url = %pool.database_url_masked(), "Using PostgreSQL user directory");
            Ok(Arc::new(PgUserDirectory::new(pool)))
        }
        other => Err(AppError::Internal(format!(
            "Unknown identity backend: {}",
            other
        ))),
    }
}
