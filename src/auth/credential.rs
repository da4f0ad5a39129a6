//! Credential extraction from the WebSocket handshake.
//!
//! The extractor is a plain function so the admission path can be driven by
//! synthetic handshakes in tests, without a live transport.

use std::collections::HashMap;

use axum::http::HeaderMap;

/// Name of the handshake field carrying the credential
pub const AUTHENTICATION_FIELD: &str = "authentication";

/// Out-of-band metadata supplied by a connecting client
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
}

impl Handshake {
    pub fn new(headers: HeaderMap, query: HashMap<String, String>) -> Self {
        Self { headers, query }
    }

    /// Build a handshake carrying only an `authentication` header
    pub fn with_credential(credential: &str) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = credential.parse() {
            headers.insert(AUTHENTICATION_FIELD, value);
        }
        Self {
            headers,
            query: HashMap::new(),
        }
    }
}

/// Pulls the credential string out of a handshake, if any
pub type CredentialExtractor = fn(&Handshake) -> Option<String>;

/// Read the `authentication` header only
pub fn extract_header_credential(handshake: &Handshake) -> Option<String> {
    handshake
        .headers
        .get(AUTHENTICATION_FIELD)
        .and_then(|v| v.to_str().ok())
        .and_then(normalize)
}

/// Read the `authentication` header, falling back to the `authentication`
/// query parameter for clients that cannot set headers on a WebSocket.
pub fn extract_credential(handshake: &Handshake) -> Option<String> {
    extract_header_credential(handshake).or_else(|| {
        handshake
            .query
            .get(AUTHENTICATION_FIELD)
            .and_then(|v| normalize(v))
    })
}

fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let token = trimmed.strip_prefix("Bearer ").unwrap_or(trimmed).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
