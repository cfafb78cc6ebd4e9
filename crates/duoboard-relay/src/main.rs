//! Duoboard WebSocket Relay Server
//!
//! Pairs two peers per room and forwards named-channel packets between them.
//!
//! ## Protocol
//!
//! Messages are JSON with a `type` tag:
//! ```json
//! { "type": "join", "room": "room-id", "peer_id": "alice" }
//! { "type": "send", "to": "bob", "channel": "whiteboard", "data": "..." }
//! { "type": "leave" }
//! ```

mod config;
mod room;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use config::RelayConfig;
use duoboard_core::transport::relay::{RelayClientMessage, RelayServerMessage};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use room::{Envelope, Rooms};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

type Sender = SplitSink<WebSocket, Message>;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duoboard_relay=info,tower_http=info".into()),
        )
        .init();

    let config = RelayConfig::from_env();
    let state = Arc::new(Rooms::new(config.room_capacity));

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Duoboard relay listening on {} ({} peers per room)", config.addr, config.room_capacity);
    info!("WebSocket endpoint: ws://{}/ws", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await
}

async fn index() -> &'static str {
    "Duoboard Relay Server - Connect via WebSocket at /ws"
}

async fn health(State(state): State<Arc<Rooms>>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok", "rooms": state.room_count() }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<Rooms>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and send one server message. Returns false once the socket is gone.
async fn reply(sender: &mut Sender, msg: &RelayServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("failed to encode relay message: {}", e);
            true
        }
    }
}

/// The room and peer id a connection joined under.
struct Seat {
    room: String,
    peer_id: String,
    rx: broadcast::Receiver<Envelope>,
}

async fn handle_socket(socket: WebSocket, state: Arc<Rooms>) {
    let conn = Uuid::new_v4();
    info!("New connection: {}", conn);

    let (mut sender, mut receiver) = socket.split();
    let mut seat: Option<Seat> = None;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket error on {}: {}", conn, e);
                        break;
                    }
                };

                let client_msg = match serde_json::from_str::<RelayClientMessage>(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Invalid message on {}: {}", conn, e);
                        let err = RelayServerMessage::Error { message: format!("invalid message: {}", e) };
                        if !reply(&mut sender, &err).await {
                            break;
                        }
                        continue;
                    }
                };

                let response = match client_msg {
                    RelayClientMessage::Join { room, peer_id } => {
                        if let Some(old) = seat.take() {
                            state.leave(&old.room, &old.peer_id);
                        }
                        match state.join(&room, &peer_id) {
                            Ok(membership) => {
                                info!("Peer {} joined room {} on {}", peer_id, room, conn);
                                let joined = RelayServerMessage::Joined { room: room.clone(), peers: membership.peers };
                                seat = Some(Seat { room, peer_id, rx: membership.rx });
                                Some(joined)
                            }
                            Err(e) => {
                                info!("Peer {} refused from room {}: {}", peer_id, room, e);
                                Some(RelayServerMessage::Error { message: e.to_string() })
                            }
                        }
                    }
                    RelayClientMessage::Leave => {
                        if let Some(old) = seat.take() {
                            state.leave(&old.room, &old.peer_id);
                            info!("Peer {} left room {}", old.peer_id, old.room);
                        }
                        None
                    }
                    RelayClientMessage::Send { to, channel, data } => {
                        let result = match &seat {
                            Some(s) => state.forward(&s.room, &s.peer_id, &to, channel, data),
                            None => Err(room::RoomError::NotJoined),
                        };
                        result.err().map(|e| {
                            debug!("Dropping packet on {}: {}", conn, e);
                            RelayServerMessage::Error { message: e.to_string() }
                        })
                    }
                };

                if let Some(response) = response {
                    if !reply(&mut sender, &response).await {
                        break;
                    }
                }
            }

            envelope = async {
                match &mut seat {
                    Some(s) => match s.rx.recv().await {
                        Ok(env) => Some(env),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Connection {} lagged by {} messages", conn, n);
                            None
                        }
                        Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
                    },
                    None => std::future::pending::<Option<Envelope>>().await,
                }
            } => {
                let Some(envelope) = envelope else { continue };
                let Some(s) = &seat else { continue };
                if envelope.is_for(&s.peer_id) && !reply(&mut sender, &envelope.message).await {
                    break;
                }
            }
        }
    }

    if let Some(old) = seat {
        state.leave(&old.room, &old.peer_id);
    }
    info!("Connection closed: {}", conn);
}
