use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use crate::connection_manager::ConnectionId;
use crate::identity::{IdentityResolver, ResolveError};
use crate::metrics::AdmissionMetrics;

use super::{TokenVerifier, VerifyError};

/// Outcome of a successful admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionResult {
    pub identity: String,
    pub display_name: String,
}

/// The only signal a rejected client ever gets: a closed connection
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthenticated")]
    Unauthenticated,
}

/// Internal rejection cause, logged but never sent to the client
#[derive(Debug, Error)]
enum Rejection {
    #[error("missing credential")]
    MissingCredential,
    #[error(transparent)]
    Token(#[from] VerifyError),
    #[error(transparent)]
    Identity(#[from] ResolveError),
    #[error("admission timed out after {0:?}")]
    TimedOut(Duration),
}

impl Rejection {
    fn reason(&self) -> &'static str {
        match self {
            Rejection::MissingCredential => "missing_credential",
            Rejection::Token(_) => "invalid_token",
            Rejection::Identity(ResolveError::UnknownIdentity(_)) => "unknown_identity",
            Rejection::Identity(ResolveError::Backend(_)) => "resolver_error",
            Rejection::TimedOut(_) => "timeout",
        }
    }
}

/// Decides whether an incoming connection may join the registry.
///
/// Runs token verification then identity lookup, both bounded by a single
/// admission timeout. Never touches the registry.
pub struct AuthenticationGate {
    verifier: Arc<dyn TokenVerifier>,
    resolver: Arc<dyn IdentityResolver>,
    admission_timeout: Duration,
}

impl AuthenticationGate {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        resolver: Arc<dyn IdentityResolver>,
        admission_timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            resolver,
            admission_timeout,
        }
    }

    #[tracing::instrument(
        name = "gate.admit",
        skip(self, credential),
        fields(has_credential = credential.is_some())
    )]
    pub async fn admit(
        &self,
        connection_id: ConnectionId,
        credential: Option<&str>,
    ) -> Result<AdmissionResult, AuthError> {
        let outcome = match timeout(self.admission_timeout, self.authenticate(credential)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Rejection::TimedOut(self.admission_timeout)),
        };

        match outcome {
            Ok(admitted) => {
                AdmissionMetrics::record_admitted();
                tracing::info!(
                    connection_id = %connection_id,
                    identity = %admitted.identity,
                    "Connection admitted"
                );
                Ok(admitted)
            }
            Err(rejection) => {
                AdmissionMetrics::record_rejected(rejection.reason());
                tracing::warn!(
                    connection_id = %connection_id,
                    reason = rejection.reason(),
                    error = %rejection,
                    "Connection rejected"
                );
                Err(AuthError::Unauthenticated)
            }
        }
    }

    async fn authenticate(&self, credential: Option<&str>) -> Result<AdmissionResult, Rejection> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(Rejection::MissingCredential)?;

        let identity = self.verifier.verify(credential).await?;
        let display_name = self.resolver.resolve(&identity).await?;

        Ok(AdmissionResult {
            identity,
            display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::identity::InMemoryUserDirectory;

    /// Accepts "token-<id>" and returns <id>
    struct PrefixVerifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenVerifier for PrefixVerifier {
        async fn verify(&self, credential: &str) -> Result<String, VerifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            credential
                .strip_prefix("token-")
                .map(str::to_string)
                .ok_or_else(|| VerifyError::InvalidToken("bad prefix".to_string()))
        }
    }

    struct StalledResolver;

    #[async_trait]
    impl IdentityResolver for StalledResolver {
        async fn resolve(&self, _identity: &str) -> Result<String, ResolveError> {
            std::future::pending().await
        }

        fn backend_name(&self) -> &'static str {
            "stalled"
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl IdentityResolver for FailingResolver {
        async fn resolve(&self, _identity: &str) -> Result<String, ResolveError> {
            Err(ResolveError::Backend("connection refused".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    fn gate_with(resolver: Arc<dyn IdentityResolver>) -> (AuthenticationGate, Arc<PrefixVerifier>) {
        let verifier = Arc::new(PrefixVerifier {
            calls: AtomicUsize::new(0),
        });
        let gate = AuthenticationGate::new(verifier.clone(), resolver, Duration::from_millis(100));
        (gate, verifier)
    }

    fn directory() -> Arc<InMemoryUserDirectory> {
        let directory = InMemoryUserDirectory::new();
        directory.upsert("u1", "Ada", true);
        directory.upsert("u9", "Retired", false);
        Arc::new(directory)
    }

    #[tokio::test]
    async fn test_admit_valid_credential() {
        let (gate, _) = gate_with(directory());

        let admitted = gate.admit(Uuid::new_v4(), Some("token-u1")).await.unwrap();
        assert_eq!(
            admitted,
            AdmissionResult {
                identity: "u1".to_string(),
                display_name: "Ada".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_credential_skips_verifier() {
        let (gate, verifier) = gate_with(directory());

        assert_eq!(
            gate.admit(Uuid::new_v4(), None).await,
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(
            gate.admit(Uuid::new_v4(), Some("  ")).await,
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthenticated() {
        let (gate, verifier) = gate_with(directory());

        let result = gate.admit(Uuid::new_v4(), Some("garbage")).await;
        assert_eq!(result, Err(AuthError::Unauthenticated));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_identity_is_unauthenticated() {
        let (gate, _) = gate_with(directory());

        assert_eq!(
            gate.admit(Uuid::new_v4(), Some("token-nobody")).await,
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(
            gate.admit(Uuid::new_v4(), Some("token-u9")).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_resolver_backend_failure_is_unauthenticated() {
        let (gate, _) = gate_with(Arc::new(FailingResolver));

        let result = gate.admit(Uuid::new_v4(), Some("token-u1")).await;
        assert_eq!(result, Err(AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_stalled_resolver_times_out() {
        let (gate, _) = gate_with(Arc::new(StalledResolver));

        let result = gate.admit(Uuid::new_v4(), Some("token-u1")).await;
        assert_eq!(result, Err(AuthError::Unauthenticated));
    }
}
