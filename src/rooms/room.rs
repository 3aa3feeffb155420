use bytes::Bytes;
use tracing::{debug, info};

use crate::common::{ConnectionId, RoomError, RoomId, SessionId, UserId, now_ms};
use crate::configs::RecordingConfig;
use crate::protocol::{
    ChunkAck, RecordingData, RecordingDescriptor, RecordingStatus, RoomMemberInfo, SessionSummary,
};
use crate::recording::{RecordingSession, RecordingStore};

/// One member of a room.
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub joined_at: u64,
}

/// A named group of connected users sharing signaling and an optional
/// recording session.
///
/// The room is recording iff `session` is present; there is no separate
/// flag to drift out of sync. All mutation goes through the owning
/// directory's per-room mutex, which serializes every room operation.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    members: Vec<RoomMember>,
    session: Option<RecordingSession>,
    pub last_activity: u64,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: Vec::new(),
            session: None,
            last_activity: now_ms(),
        }
    }

    /// Inserts the member, or refreshes the connection of an existing entry
    /// in place (idempotent; join order is preserved).
    ///
    /// Does not start recording for late joiners: their recorder is created
    /// lazily on first audio chunk.
    pub fn add_member(&mut self, user_id: UserId, connection_id: ConnectionId) {
        self.last_activity = now_ms();
        if let Some(member) = self.members.iter_mut().find(|m| m.user_id == user_id) {
            member.connection_id = connection_id;
            return;
        }
        self.members.push(RoomMember {
            user_id: user_id.clone(),
            connection_id,
            joined_at: now_ms(),
        });
        debug!(
            "Room {}: Added user {}. Total users: {}",
            self.id,
            user_id,
            self.members.len()
        );
    }

    /// Removes the member, finalizing their active recorder first so a
    /// partial recording is saved rather than discarded.
    pub async fn remove_member(&mut self, user_id: &UserId, store: &RecordingStore) -> bool {
        self.last_activity = now_ms();
        let Some(pos) = self.members.iter().position(|m| &m.user_id == user_id) else {
            return false;
        };
        self.members.remove(pos);
        debug!(
            "Room {}: Removed user {}. Total users: {}",
            self.id,
            user_id,
            self.members.len()
        );

        if let Some(session) = &mut self.session
            && session.has_recorder(user_id)
        {
            session.finalize_user(user_id, store).await;
        }
        true
    }

    /// Members in join order.
    pub fn members(&self) -> &[RoomMember] {
        &self.members
    }

    pub fn member_infos(&self) -> Vec<RoomMemberInfo> {
        self.members
            .iter()
            .map(|m| RoomMemberInfo {
                user_id: m.user_id.clone(),
                socket_id: m.connection_id.clone(),
                joined_at: m.joined_at,
            })
            .collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.members.iter().any(|m| &m.user_id == user_id)
    }

    pub fn member_by_connection(&self, connection_id: &ConnectionId) -> Option<&RoomMember> {
        self.members
            .iter()
            .find(|m| &m.connection_id == connection_id)
    }

    pub fn touch(&mut self) {
        self.last_activity = now_ms();
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|s| s.id())
    }

    /// Starts a recording session covering every present member.
    pub fn start_recording(
        &mut self,
        store: &RecordingStore,
        config: &RecordingConfig,
    ) -> Result<SessionId, RoomError> {
        if self.session.is_some() {
            return Err(RoomError::AlreadyRecording);
        }
        let member_ids = self.members.iter().map(|m| m.user_id.clone()).collect();
        let session = RecordingSession::begin(self.id.clone(), member_ids, store, config);
        let id = session.id().clone();
        self.session = Some(session);
        Ok(id)
    }

    /// Stops the session, finalizing every recorder and persisting the
    /// summary. The room is back to not-recording on return.
    pub async fn stop_recording(
        &mut self,
        store: &RecordingStore,
    ) -> Result<(SessionSummary, Vec<RecordingDescriptor>), RoomError> {
        let session = self.session.take().ok_or(RoomError::NotRecording)?;
        Ok(session.finish(store).await)
    }

    /// Appends an audio chunk for the user. `None` when no session is
    /// active or the user is not a member; members who joined mid-session
    /// get a recorder created on the spot, then the append proceeds.
    pub fn append_chunk(
        &mut self,
        user_id: &UserId,
        data: Bytes,
        index: Option<u64>,
        store: &RecordingStore,
    ) -> Option<ChunkAck> {
        self.last_activity = now_ms();
        let session = self.session.as_mut()?;
        if !session.has_recorder(user_id) {
            if !self.members.iter().any(|m| &m.user_id == user_id) {
                return None;
            }
            session.ensure_recorder(user_id, store);
        }
        session.append(user_id, data, index)
    }

    pub fn recorder_over_cap(&self, user_id: &UserId) -> bool {
        self.session.as_ref().is_some_and(|s| s.over_cap(user_id))
    }

    /// Force-finalizes one user's recorder mid-session (byte-cap breach).
    pub async fn finalize_recorder(
        &mut self,
        user_id: &UserId,
        store: &RecordingStore,
    ) -> Option<RecordingDescriptor> {
        info!("Force-finalizing recorder for user {} in room {}", user_id, self.id);
        self.session.as_mut()?.finalize_user(user_id, store).await
    }

    pub fn recording_data(&self, user_id: &UserId) -> Option<RecordingData> {
        self.session.as_ref()?.recording_data(user_id)
    }

    pub fn recording_status(&self) -> RecordingStatus {
        match &self.session {
            Some(session) => session.status(),
            None => RecordingStatus {
                is_recording: false,
                session_id: None,
                active_recordings: Vec::new(),
                user_recording_stats: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> RecordingStore {
        let root = std::env::temp_dir().join(format!("voicelink-test-{}", uuid::Uuid::new_v4()));
        let store = RecordingStore::new(root);
        store.ensure_root().expect("create temp store");
        store
    }

    fn room_with(users: &[&str]) -> Room {
        let mut room = Room::new("r1".into());
        for user in users {
            room.add_member(UserId::from(*user), ConnectionId::generate());
        }
        room
    }

    #[tokio::test]
    async fn membership_count_tracks_adds_and_removes() {
        let store = temp_store();
        let mut room = room_with(&["a", "b", "c"]);
        assert_eq!(room.member_count(), 3);

        assert!(room.remove_member(&"b".into(), &store).await);
        assert!(!room.remove_member(&"b".into(), &store).await);
        assert_eq!(room.member_count(), 2);

        room.remove_member(&"a".into(), &store).await;
        room.remove_member(&"c".into(), &store).await;
        assert!(room.is_empty());
    }

    #[test]
    fn members_iterate_in_join_order() {
        let room = room_with(&["first", "second", "third"]);
        let order: Vec<&str> = room.members().iter().map(|m| &*m.user_id).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn re_adding_a_member_is_idempotent_and_keeps_position() {
        let mut room = room_with(&["a", "b"]);
        let new_conn = ConnectionId::generate();
        room.add_member("a".into(), new_conn.clone());

        assert_eq!(room.member_count(), 2);
        assert_eq!(&*room.members()[0].user_id, "a");
        assert_eq!(room.members()[0].connection_id, new_conn);
    }

    #[test]
    fn member_lookup_by_connection() {
        let mut room = Room::new("r1".into());
        let conn = ConnectionId::generate();
        room.add_member("a".into(), conn.clone());

        assert_eq!(
            &*room.member_by_connection(&conn).expect("member").user_id,
            "a"
        );
        assert!(room.member_by_connection(&ConnectionId::generate()).is_none());
    }

    #[tokio::test]
    async fn start_while_recording_is_a_conflict_without_mutation() {
        let store = temp_store();
        let mut room = room_with(&["a"]);
        let first = room
            .start_recording(&store, &RecordingConfig::default())
            .expect("first start");

        let err = room
            .start_recording(&store, &RecordingConfig::default())
            .expect_err("second start must conflict");
        assert!(matches!(err, RoomError::AlreadyRecording));
        // The original session is untouched.
        assert_eq!(room.session_id(), Some(&first));
    }

    #[tokio::test]
    async fn stop_without_recording_is_a_conflict() {
        let store = temp_store();
        let mut room = room_with(&["a"]);
        let err = room
            .stop_recording(&store)
            .await
            .expect_err("stop must conflict");
        assert!(matches!(err, RoomError::NotRecording));
        assert!(!room.is_recording());
    }

    #[tokio::test]
    async fn append_without_session_fails_silently() {
        let store = temp_store();
        let mut room = room_with(&["a"]);
        assert!(
            room.append_chunk(&"a".into(), Bytes::from_static(&[1]), None, &store)
                .is_none()
        );
    }

    #[tokio::test]
    async fn late_joiner_gets_recorder_on_first_chunk() {
        let store = temp_store();
        let mut room = room_with(&["a"]);
        room.start_recording(&store, &RecordingConfig::default())
            .expect("start");

        room.add_member("late".into(), ConnectionId::generate());
        let ack = room
            .append_chunk(&"late".into(), Bytes::from_static(&[1, 2]), Some(0), &store)
            .expect("lazy recorder append");
        assert_eq!(ack.total_chunks, 1);

        // A non-member never gets a recorder.
        assert!(
            room.append_chunk(&"ghost".into(), Bytes::from_static(&[1]), None, &store)
                .is_none()
        );
    }

    #[tokio::test]
    async fn removing_member_finalizes_their_recorder() {
        let store = temp_store();
        let mut room = room_with(&["a", "b"]);
        let session_id = room
            .start_recording(&store, &RecordingConfig::default())
            .expect("start");
        room.append_chunk(&"a".into(), Bytes::from_static(&[1, 2, 3]), Some(0), &store);

        room.remove_member(&"a".into(), &store).await;

        // Partial recording was saved, not discarded.
        let filename = format!("{session_id}-user-a.webm");
        assert_eq!(
            store.read_file(&filename).await.expect("file"),
            vec![1, 2, 3]
        );

        // The session itself keeps running for remaining members, and the
        // leaver's recording still counts toward the final summary.
        assert!(room.is_recording());
        let (summary, _) = room.stop_recording(&store).await.expect("stop");
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.total_size, 3);
        assert_eq!(&*summary.user_recordings[0].user_id, "a");
    }

    #[tokio::test]
    async fn stop_scenario_reassembles_and_totals() {
        let store = temp_store();
        let mut room = room_with(&["a", "b"]);
        room.start_recording(&store, &RecordingConfig::default())
            .expect("start");

        room.append_chunk(&"a".into(), Bytes::from_static(&[1, 2, 3]), Some(0), &store);
        room.append_chunk(&"a".into(), Bytes::from_static(&[4, 5]), Some(1), &store);

        let (summary, results) = room.stop_recording(&store).await.expect("stop");
        assert_eq!(summary.total_size, 5);
        assert_eq!(summary.total_files, 1);
        assert_eq!(results[0].info.size, 5);
        assert!(!room.is_recording());
    }
}
