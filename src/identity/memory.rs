use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::UserSeed;

use super::{IdentityResolver, ResolveError};

#[derive(Debug, Clone)]
struct UserRecord {
    full_name: String,
    is_active: bool,
}

/// In-memory user directory, seeded from configuration
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, UserRecord>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seeds(seeds: &[UserSeed]) -> Self {
        let directory = Self::new();
        for seed in seeds {
            directory.upsert(&seed.id, &seed.full_name, seed.is_active);
        }
        directory
    }

    /// Insert or replace a user
    pub fn upsert(&self, id: &str, full_name: &str, is_active: bool) {
        self.users.insert(
            id.to_string(),
            UserRecord {
                full_name: full_name.to_string(),
                is_active,
            },
        );
    }
}

#[async_trait]
impl IdentityResolver for InMemoryUserDirectory {
    async fn resolve(&self, identity: &str) -> Result<String, ResolveError> {
        match self.users.get(identity) {
            Some(record) if record.is_active => Ok(record.full_name.clone()),
            _ => Err(ResolveError::UnknownIdentity(identity.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_known_user() {
        let directory = InMemoryUserDirectory::new();
        directory.upsert("u1", "Ada", true);

        assert_eq!(directory.resolve("u1").await.unwrap(), "Ada");
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_users() {
        let directory = InMemoryUserDirectory::new();
        directory.upsert("u2", "Bob", false);

        assert!(matches!(
            directory.resolve("nobody").await,
            Err(ResolveError::UnknownIdentity(_))
        ));
        assert!(matches!(
            directory.resolve("u2").await,
            Err(ResolveError::UnknownIdentity(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_user() {
        let directory = InMemoryUserDirectory::new();
        directory.upsert("u1", "Ada", true);
        directory.upsert("u1", "Ada Lovelace", true);
        assert_eq!(directory.resolve("u1").await.unwrap(), "Ada Lovelace");

        directory.upsert("u1", "Ada Lovelace", false);
        assert!(directory.resolve("u1").await.is_err());
    }
}
