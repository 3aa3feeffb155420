use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::common::{ConnectionId, RoomId, UserId};
use crate::protocol::OutgoingMessage;
use crate::server::AppState;

#[derive(Debug, Clone, Copy)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Stateless relay for WebRTC handshake messages.
///
/// Re-broadcasts to every other connection in the room; `targetUserId` is
/// advisory and receivers self-filter. Messages from one sender keep their
/// send order, nothing is guaranteed across senders.
pub async fn relay(
    state: &Arc<AppState>,
    conn_id: &ConnectionId,
    kind: SignalKind,
    room_id: RoomId,
    target_user_id: UserId,
    payload: Value,
) {
    let Some(binding) = state.registry.lookup(conn_id) else {
        debug!("Dropping signal from unbound connection {}", conn_id);
        return;
    };
    let from_user_id = binding.user_id;

    let Some(room) = state.rooms.get(&room_id) else {
        debug!("Dropping signal for unknown room {}", room_id);
        return;
    };

    debug!(
        "WebRTC {:?} from {} to {} in room {}",
        kind, from_user_id, target_user_id, room_id
    );

    let msg = match kind {
        SignalKind::Offer => OutgoingMessage::WebrtcOffer {
            from_user_id,
            target_user_id,
            payload,
        },
        SignalKind::Answer => OutgoingMessage::WebrtcAnswer {
            from_user_id,
            target_user_id,
            payload,
        },
        SignalKind::IceCandidate => OutgoingMessage::WebrtcIceCandidate {
            from_user_id,
            target_user_id,
            payload,
        },
    };

    let room = room.lock().await;
    let conns: Vec<ConnectionId> = room
        .members()
        .iter()
        .map(|m| m.connection_id.clone())
        .collect();
    drop(room);

    state.registry.emit_to_all_except(conns.iter(), conn_id, &msg);
}
