use std::collections::HashMap;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::{AdmissionResult, Handshake};
use crate::connection_manager::ConnectionId;
use crate::metrics::{ConnectionMetrics, InboundMetrics};
use crate::server::AppState;

use super::message::{ClientMessage, OutboundMessage, PresenceOrdering};

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip_all)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let handshake = Handshake::new(headers, query);
    let credential = (state.credential_extractor)(&handshake);

    // Authentication runs after the upgrade so a rejected client only ever
    // sees the socket close.
    ws.on_upgrade(move |socket| handle_socket(socket, state, credential))
}

/// Handle an upgraded WebSocket: admit, register, pump frames, clean up
#[tracing::instrument(
    name = "ws.connection",
    skip_all,
    fields(connection_id = tracing::field::Empty, otel.kind = "server")
)]
async fn handle_socket(mut socket: WebSocket, state: AppState, credential: Option<String>) {
    let connection_id: ConnectionId = Uuid::new_v4();
    tracing::Span::current().record("connection_id", tracing::field::display(connection_id));

    let admitted = match state.gate.admit(connection_id, credential.as_deref()).await {
        Ok(admitted) => admitted,
        Err(_) => {
            // Nothing was registered, so there is nothing to clean up
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let Some(rx) = register(&state, connection_id, admitted, &mut socket).await else {
        return;
    };
    let connection_start = Instant::now();

    state.sinks.deliver(&state.dispatcher.on_admitted(connection_id));

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for writing queued frames to the WebSocket
    let mut send_task = tokio::spawn(async move {
        let mut rx = rx;
        let mut ordering = PresenceOrdering::new();
        while let Some(msg) = rx.recv().await {
            if !ordering.should_forward(&msg) {
                continue;
            }
            if ws_sender.send(Message::Text(msg.into_text())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // Task for reading client frames, one at a time
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &recv_state, connection_id) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Wait for either side to finish, then stop the other
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_task.abort();
        }
    }

    state.registry.remove(connection_id);
    state.sinks.remove(connection_id);
    ConnectionMetrics::set_registered(state.registry.size());
    state.sinks.deliver(&state.dispatcher.on_disconnected(connection_id));

    let duration = connection_start.elapsed().as_secs_f64();
    ConnectionMetrics::observe_duration(duration);

    tracing::info!(
        connection_id = %connection_id,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}

/// Install the outbound queue and register the connection.
///
/// Returns the queue's receiving end, or `None` if registration failed and
/// the socket was closed.
async fn register(
    state: &AppState,
    connection_id: ConnectionId,
    admitted: AdmissionResult,
    socket: &mut WebSocket,
) -> Option<mpsc::Receiver<OutboundMessage>> {
    let (tx, rx) = mpsc::channel::<OutboundMessage>(state.settings.gateway.outbound_buffer);

    // The sink must exist before the id becomes visible in presence snapshots
    state.sinks.insert(connection_id, tx);

    let AdmissionResult {
        identity,
        display_name,
    } = admitted;

    if let Err(e) = state.registry.register(connection_id, identity, display_name) {
        tracing::error!(connection_id = %connection_id, error = %e, "Registry invariant violated, dropping connection");
        state.sinks.remove(connection_id);
        let _ = socket.send(Message::Close(None)).await;
        return None;
    }

    ConnectionMetrics::set_registered(state.registry.size());
    Some(rx)
}

/// Process a received WebSocket frame.
/// Returns false if the connection should be closed.
fn process_message(msg: Message, state: &AppState, connection_id: ConnectionId) -> bool {
    match msg {
        Message::Text(text) => {
            match ClientMessage::parse(text.as_str()) {
                Ok(ClientMessage::MessageFromClient { message }) => {
                    let broadcasts = state.dispatcher.on_client_message(connection_id, message);
                    state.sinks.deliver(&broadcasts);
                }
                Err(e) => {
                    InboundMetrics::record_malformed();
                    tracing::warn!(connection_id = %connection_id, error = %e, "Ignoring malformed client message");
                }
            }
            true
        }
        Message::Binary(_) => {
            InboundMetrics::record_malformed();
            tracing::warn!(connection_id = %connection_id, "Ignoring binary frame");
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Received close frame");
            false
        }
    }
}
