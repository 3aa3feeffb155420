use axum::extract::ws::Message;
use dashmap::DashMap;

use crate::common::{ConnectionId, RoomId, UserId};
use crate::protocol::OutgoingMessage;

/// Current (user, room) binding of one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub user_id: UserId,
    pub room_id: RoomId,
}

/// Tracks live connections: their outbound message channels and their
/// at-most-one (user, room) binding each.
///
/// Emitting is a non-blocking channel send; a closed or missing peer is
/// silently skipped, so broadcasting never stalls on a dying socket.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    peers: DashMap<ConnectionId, flume::Sender<Message>>,
    bindings: DashMap<ConnectionId, Binding>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn_id: ConnectionId, sender: flume::Sender<Message>) {
        self.peers.insert(conn_id, sender);
    }

    /// Forgets the peer channel. The binding is cleared separately by the
    /// disconnect path, which needs it to run room-side removal first.
    pub fn deregister(&self, conn_id: &ConnectionId) {
        self.peers.remove(conn_id);
    }

    /// Binds the connection, returning the binding it displaced (if any) so
    /// the caller can cascade removal from the previous room. Rebinding is
    /// a move, not an error.
    pub fn bind(&self, conn_id: ConnectionId, user_id: UserId, room_id: RoomId) -> Option<Binding> {
        self.bindings.insert(conn_id, Binding { user_id, room_id })
    }

    pub fn lookup(&self, conn_id: &ConnectionId) -> Option<Binding> {
        self.bindings.get(conn_id).map(|b| b.clone())
    }

    /// Clears the binding; room-side removal is the caller's job.
    pub fn unbind(&self, conn_id: &ConnectionId) -> Option<Binding> {
        self.bindings.remove(conn_id).map(|(_, b)| b)
    }

    pub fn connection_count(&self) -> usize {
        self.bindings.len()
    }

    /// Sends one message to one connection.
    pub fn emit(&self, conn_id: &ConnectionId, msg: &OutgoingMessage) {
        let Some(peer) = self.peers.get(conn_id) else {
            return;
        };
        if let Ok(json) = serde_json::to_string(msg) {
            let _ = peer.send(Message::Text(json.into()));
        }
    }

    /// Sends one message to every listed connection, serializing once.
    pub fn emit_to_all<'a>(
        &self,
        conn_ids: impl IntoIterator<Item = &'a ConnectionId>,
        msg: &OutgoingMessage,
    ) {
        let Ok(json) = serde_json::to_string(msg) else {
            return;
        };
        for conn_id in conn_ids {
            if let Some(peer) = self.peers.get(conn_id) {
                let _ = peer.send(Message::Text(json.clone().into()));
            }
        }
    }

    /// Broadcast that skips the sending connection.
    pub fn emit_to_all_except<'a>(
        &self,
        conn_ids: impl IntoIterator<Item = &'a ConnectionId>,
        except: &ConnectionId,
        msg: &OutgoingMessage,
    ) {
        self.emit_to_all(conn_ids.into_iter().filter(|id| *id != except), msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_rebind_and_unbind() {
        let registry = ConnectionRegistry::new();
        let conn = ConnectionId::generate();

        assert!(registry.bind(conn.clone(), "alice".into(), "r1".into()).is_none());
        assert_eq!(
            registry.lookup(&conn),
            Some(Binding {
                user_id: "alice".into(),
                room_id: "r1".into()
            })
        );

        // Rebinding hands back the displaced binding for cascade cleanup.
        let displaced = registry
            .bind(conn.clone(), "alice".into(), "r2".into())
            .expect("displaced binding");
        assert_eq!(displaced.room_id, "r1".into());
        assert_eq!(registry.lookup(&conn).expect("binding").room_id, "r2".into());

        assert!(registry.unbind(&conn).is_some());
        assert!(registry.lookup(&conn).is_none());
        assert!(registry.unbind(&conn).is_none());
    }

    #[test]
    fn emit_skips_missing_and_excluded_peers() {
        let registry = ConnectionRegistry::new();
        let (tx_a, rx_a) = flume::unbounded();
        let (tx_b, rx_b) = flume::unbounded();
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        let gone = ConnectionId::generate();
        registry.register(a.clone(), tx_a);
        registry.register(b.clone(), tx_b);

        let msg = OutgoingMessage::RoomJoinError {
            error: "test".to_string(),
        };
        let ids = [a.clone(), b.clone(), gone];
        registry.emit_to_all_except(ids.iter(), &a, &msg);

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }
}
