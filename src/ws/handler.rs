use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use tracing::{error, info, warn};

use crate::common::ConnectionId;
use crate::protocol::IncomingMessage;
use crate::server::AppState;
use crate::ws::ops::{handle_disconnect, handle_op};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

pub async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let conn_id = ConnectionId::generate();
    let (tx, rx) = flume::unbounded();
    state.registry.register(conn_id.clone(), tx);
    info!("User connected: {}", conn_id);

    loop {
        tokio::select! {
            Ok(msg) = rx.recv_async() => {
                if let Err(e) = socket.send(msg).await {
                    error!("Socket send error: conn={} err={}", conn_id, e);
                    break;
                }
            }
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket error: conn={} err={}", conn_id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<IncomingMessage>(&text) {
                            Ok(op) => handle_op(op, &state, &conn_id).await,
                            Err(e) => {
                                warn!("Bad WS msg: conn={} err={}", conn_id, e);
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    // A dropped socket behaves exactly like an explicit leave.
    info!("User disconnected: {}", conn_id);
    handle_disconnect(&state, &conn_id).await;
    state.registry.deregister(&conn_id);
}
