use std::sync::Arc;
use std::time::Instant;

use crate::auth::{extract_credential, AuthenticationGate, CredentialExtractor, TokenVerifier};
use crate::config::Settings;
use crate::connection_manager::ConnectionRegistry;
use crate::gateway::{GatewayDispatcher, PeerSinks};
use crate::identity::IdentityResolver;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub gate: Arc<AuthenticationGate>,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<GatewayDispatcher>,
    pub sinks: Arc<PeerSinks>,
    pub credential_extractor: CredentialExtractor,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        verifier: Arc<dyn TokenVerifier>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let gate = Arc::new(AuthenticationGate::new(
            verifier,
            resolver,
            settings.gateway.admission_timeout(),
        ));
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(GatewayDispatcher::new(registry.clone()));

        Self {
            settings: Arc::new(settings),
            gate,
            registry,
            dispatcher,
            sinks: Arc::new(PeerSinks::new()),
            credential_extractor: extract_credential,
            started_at: Instant::now(),
        }
    }

    /// Replace the handshake credential extractor
    pub fn with_credential_extractor(mut self, extractor: CredentialExtractor) -> Self {
        self.credential_extractor = extractor;
        self
    }
}
