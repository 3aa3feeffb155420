use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::common::RoomId;
use crate::rooms::room::Room;

/// Registry of live rooms.
///
/// Each room sits behind its own `Mutex`; holding it for the duration of a
/// room operation is what serializes joins, leaves, recording control and
/// chunk appends against each other. Sink I/O stays off the lock path.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: DashMap<RoomId, Arc<Mutex<Room>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the room, creating an empty one on first join.
    pub fn get_or_create(&self, room_id: &RoomId) -> Arc<Mutex<Room>> {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                info!("Created new room: {}", room_id);
                Arc::new(Mutex::new(Room::new(room_id.clone())))
            })
            .clone()
    }

    pub fn get(&self, room_id: &RoomId) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(room_id).map(|r| r.clone())
    }

    /// Removes the room only when it has no members and no active session.
    /// Callers force-stop an active session before deleting an empty room.
    ///
    /// The check runs under `remove_if`, so a concurrent `get_or_create` on
    /// the same id cannot slip in between check and removal; a room whose
    /// mutex is currently contended is simply left in place.
    pub fn delete_if_empty(&self, room_id: &RoomId) -> bool {
        let removed = self
            .rooms
            .remove_if(room_id, |_, room| {
                room.try_lock()
                    .map(|r| r.is_empty() && !r.is_recording())
                    .unwrap_or(false)
            })
            .is_some();
        if removed {
            info!("Room {} deleted (empty)", room_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Snapshot of all live rooms, for the REST surface.
    pub fn snapshot(&self) -> Vec<Arc<Mutex<Room>>> {
        self.rooms.iter().map(|r| r.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ConnectionId;
    use crate::configs::RecordingConfig;
    use crate::recording::RecordingStore;

    fn temp_store() -> RecordingStore {
        let root = std::env::temp_dir().join(format!("voicelink-test-{}", uuid::Uuid::new_v4()));
        let store = RecordingStore::new(root);
        store.ensure_root().expect("create temp store");
        store
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_room() {
        let directory = RoomDirectory::new();
        let a = directory.get_or_create(&"r1".into());
        let b = directory.get_or_create(&"r1".into());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn delete_if_empty_respects_members_and_recording() {
        let directory = RoomDirectory::new();
        let store = temp_store();
        let room = directory.get_or_create(&"r1".into());

        {
            let mut guard = room.lock().await;
            guard.add_member("a".into(), ConnectionId::generate());
        }
        assert!(!directory.delete_if_empty(&"r1".into()));

        {
            let mut guard = room.lock().await;
            guard.start_recording(&store, &RecordingConfig::default()).expect("start");
            guard.remove_member(&"a".into(), &store).await;
        }
        // Empty but still recording: not deletable until the session stops.
        assert!(!directory.delete_if_empty(&"r1".into()));

        {
            let mut guard = room.lock().await;
            guard.stop_recording(&store).await.expect("stop");
        }
        assert!(directory.delete_if_empty(&"r1".into()));
        assert!(directory.get(&"r1".into()).is_none());
    }
}
