use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Validates a signed credential and returns the identity it claims.
///
/// Implementations may perform I/O; callers bound the call with their own timeout.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<String, VerifyError>;
}
