mod claims;
mod credential;
mod gate;
mod jwt;
mod verifier;

pub use claims::Claims;
pub use credential::{
    extract_credential, extract_header_credential, CredentialExtractor, Handshake,
    AUTHENTICATION_FIELD,
};
pub use gate::{AdmissionResult, AuthError, AuthenticationGate};
pub use jwt::JwtTokenVerifier;
pub use verifier::{TokenVerifier, VerifyError};
