//! Cross-component tests for admission, registry and dispatch.
//!
//! These drive the library API directly with synthetic handshakes and
//! in-process queues; no server or database is started.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use presence_gateway::auth::{
    extract_credential, AuthError, AuthenticationGate, Claims, Handshake, JwtTokenVerifier,
};
use presence_gateway::config::JwtConfig;
use presence_gateway::connection_manager::{ConnectionId, ConnectionRegistry, RegistryError};
use presence_gateway::gateway::{Broadcast, GatewayDispatcher, PeerSinks};
use presence_gateway::identity::InMemoryUserDirectory;
use presence_gateway::websocket::{OutboundMessage, ServerMessage};

const SECRET: &str = "integration-test-secret";

struct TestEnvironment {
    gate: AuthenticationGate,
    registry: Arc<ConnectionRegistry>,
    dispatcher: GatewayDispatcher,
    sinks: PeerSinks,
}

fn create_test_environment() -> TestEnvironment {
    let verifier = Arc::new(JwtTokenVerifier::new(&JwtConfig {
        secret: SECRET.to_string(),
        issuer: None,
        audience: None,
    }));

    let directory = InMemoryUserDirectory::new();
    directory.upsert("u1", "Ada", true);
    directory.upsert("u2", "Bob", true);
    directory.upsert("u3", "Eve", false);

    let registry = Arc::new(ConnectionRegistry::new());

    TestEnvironment {
        gate: AuthenticationGate::new(verifier, Arc::new(directory), Duration::from_secs(1)),
        dispatcher: GatewayDispatcher::new(registry.clone()),
        registry,
        sinks: PeerSinks::new(),
    }
}

fn token_for(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        id: user_id.to_string(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

impl TestEnvironment {
    /// What the transport does for a connection attempt. Returns the new
    /// connection's id and queue on success.
    async fn connect(
        &self,
        handshake: &Handshake,
    ) -> Result<(ConnectionId, mpsc::Receiver<OutboundMessage>), AuthError> {
        let connection_id = Uuid::new_v4();
        let credential = extract_credential(handshake);
        let admitted = self.gate.admit(connection_id, credential.as_deref()).await?;

        let (tx, rx) = mpsc::channel(16);
        self.sinks.insert(connection_id, tx);
        self.registry
            .register(connection_id, admitted.identity, admitted.display_name)
            .unwrap();
        self.sinks.deliver(&self.dispatcher.on_admitted(connection_id));

        Ok((connection_id, rx))
    }

    fn disconnect(&self, connection_id: ConnectionId) -> Vec<Broadcast> {
        self.registry.remove(connection_id);
        self.sinks.remove(connection_id);
        let broadcasts = self.dispatcher.on_disconnected(connection_id);
        self.sinks.deliver(&broadcasts);
        broadcasts
    }
}

fn drain(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        frames.push(serde_json::from_str(msg.text().as_str()).unwrap());
    }
    frames
}

fn connected_clients(frame: &serde_json::Value) -> HashSet<String> {
    assert_eq!(frame["type"], "updated-clients");
    frame["payload"]["connectedClients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

fn id_set(ids: &[ConnectionId]) -> HashSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// =============================================================================
// Admission
// =============================================================================

mod admission_tests {
    use super::*;

    #[tokio::test]
    async fn test_n_admissions_are_all_present() {
        let env = create_test_environment();
        let mut ids = Vec::new();
        let mut queues = Vec::new();

        for user in ["u1", "u2", "u1", "u2", "u1"] {
            let (id, rx) = env
                .connect(&Handshake::with_credential(&token_for(user)))
                .await
                .unwrap();
            ids.push(id);
            queues.push(rx);
        }

        assert_eq!(env.registry.size(), 5);
        // The last admitted connection's only presence frame lists everyone
        let frames = drain(queues.last_mut().unwrap());
        assert_eq!(frames.len(), 1);
        assert_eq!(connected_clients(&frames[0]), id_set(&ids));
    }

    #[tokio::test]
    async fn test_invalid_credentials_never_touch_registry() {
        let env = create_test_environment();
        let (_, mut rx) = env
            .connect(&Handshake::with_credential(&token_for("u1")))
            .await
            .unwrap();
        drain(&mut rx);
        let broadcasts_before = env.dispatcher.stats().presence_broadcasts;

        let bad_handshakes = [
            Handshake::default(),
            Handshake::with_credential("not-a-jwt"),
            Handshake::with_credential(&token_for("ghost")),
            Handshake::with_credential(&token_for("u3")),
        ];
        for handshake in &bad_handshakes {
            assert_eq!(
                env.connect(handshake).await.unwrap_err(),
                AuthError::Unauthenticated
            );
        }

        assert_eq!(env.registry.size(), 1);
        assert_eq!(env.dispatcher.stats().presence_broadcasts, broadcasts_before);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_same_identity_holds_two_sessions() {
        let env = create_test_environment();

        let (first, _rx1) = env
            .connect(&Handshake::with_credential(&token_for("u1")))
            .await
            .unwrap();
        let (second, _rx2) = env
            .connect(&Handshake::with_credential(&token_for("u1")))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(env.registry.size(), 2);
        assert_eq!(env.registry.display_name_of(first).as_deref(), Some("Ada"));
        assert_eq!(env.registry.display_name_of(second).as_deref(), Some("Ada"));
        assert_eq!(env.registry.stats().unique_identities, 1);
    }

    #[test]
    fn test_duplicate_register_is_reported() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();

        assert_ok!(registry.register(id, "u1".into(), "Ada".into()));
        let err = assert_err!(registry.register(id, "u1".into(), "Ada".into()));
        assert_eq!(err, RegistryError::DuplicateConnection(id));
    }
}

// =============================================================================
// Dispatch
// =============================================================================

mod dispatch_tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_scenario() {
        let env = create_test_environment();

        let (a, mut rx_a) = env
            .connect(&Handshake::with_credential(&token_for("u1")))
            .await
            .unwrap();
        let (b, mut rx_b) = env
            .connect(&Handshake::with_credential(&token_for("u2")))
            .await
            .unwrap();

        let frames_a = drain(&mut rx_a);
        assert_eq!(frames_a.len(), 2);
        assert_eq!(connected_clients(&frames_a[0]), id_set(&[a]));
        assert_eq!(connected_clients(&frames_a[1]), id_set(&[a, b]));
        let frames_b = drain(&mut rx_b);
        assert_eq!(frames_b.len(), 1);
        assert_eq!(connected_clients(&frames_b[0]), id_set(&[a, b]));

        let broadcasts = env.dispatcher.on_client_message(a, "hello");
        assert_eq!(broadcasts.len(), 1);
        let result = env.sinks.deliver(&broadcasts);
        assert_eq!(result.delivered, 2);

        let expected = serde_json::json!({
            "type": "message-from-server",
            "payload": {"fullName": "Ada", "message": "hello"}
        });
        assert_eq!(drain(&mut rx_a), vec![expected.clone()]);
        assert_eq!(drain(&mut rx_b), vec![expected]);

        env.disconnect(a);
        let frames_b = drain(&mut rx_b);
        assert_eq!(frames_b.len(), 1);
        assert_eq!(connected_clients(&frames_b[0]), id_set(&[b]));
        // A's queue was detached before the presence broadcast
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn test_message_after_disconnect_is_dropped() {
        let env = create_test_environment();
        let (a, _rx_a) = env
            .connect(&Handshake::with_credential(&token_for("u1")))
            .await
            .unwrap();
        let (_b, mut rx_b) = env
            .connect(&Handshake::with_credential(&token_for("u2")))
            .await
            .unwrap();
        env.disconnect(a);
        drain(&mut rx_b);

        let broadcasts = env.dispatcher.on_client_message(a, "too late");

        assert!(broadcasts.is_empty());
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(env.dispatcher.stats().messages_dropped, 1);
    }

    #[tokio::test]
    async fn test_repeated_disconnect_is_idempotent() {
        let env = create_test_environment();
        let (a, _rx_a) = env
            .connect(&Handshake::with_credential(&token_for("u1")))
            .await
            .unwrap();
        let (b, _rx_b) = env
            .connect(&Handshake::with_credential(&token_for("u2")))
            .await
            .unwrap();

        let first = env.disconnect(a);
        let second = env.disconnect(a);

        assert_eq!(env.registry.size(), 1);
        for broadcasts in [first, second] {
            assert_eq!(broadcasts.len(), 1);
            assert_eq!(broadcasts[0].recipients, vec![b]);
            assert!(matches!(
                &broadcasts[0].message,
                ServerMessage::UpdatedClients { connected_clients, .. } if connected_clients == &vec![b]
            ));
        }
    }
}
