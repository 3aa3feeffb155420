use std::collections::HashMap;

use bytes::Bytes;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::common::{RoomId, SessionId, UserId, now_ms};
use crate::configs::RecordingConfig;
use crate::protocol::{
    ChunkAck, RecordingData, RecordingDescriptor, RecordingStatus, SessionSummary, UserChunkStats,
};
use crate::recording::recorder::UserRecorder;
use crate::recording::store::RecordingStore;

/// One recording run of a room, from start to stop.
///
/// Owns the per-user recorders. Exists only while its room is recording;
/// dropping the session is what flips the room back to not-recording.
#[derive(Debug)]
pub struct RecordingSession {
    id: SessionId,
    room_id: RoomId,
    started_at: OffsetDateTime,
    start_ms: u64,
    /// Member ids snapshotted when the session started. Late joiners are
    /// not added here; their recorders appear in `recorders` on first chunk.
    initial_users: Vec<UserId>,
    recorders: HashMap<UserId, UserRecorder>,
    /// Recordings already finalized mid-session (leavers, byte-cap
    /// breaches). Carried into the final summary; a user listed here never
    /// gets a second recorder, which would truncate their saved file.
    completed: Vec<RecordingDescriptor>,
    max_recorder_bytes: u64,
    file_extension: String,
}

impl RecordingSession {
    /// Starts a session, eagerly opening one recorder per present member.
    pub fn begin(
        room_id: RoomId,
        member_ids: Vec<UserId>,
        store: &RecordingStore,
        config: &RecordingConfig,
    ) -> Self {
        let started_at = OffsetDateTime::now_utc();
        let timestamp = started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| started_at.unix_timestamp().to_string())
            .replace([':', '.'], "-");
        let id = SessionId(format!("session-{room_id}-{timestamp}"));

        let mut session = Self {
            id,
            room_id,
            started_at,
            start_ms: now_ms(),
            initial_users: member_ids.clone(),
            recorders: HashMap::new(),
            completed: Vec::new(),
            max_recorder_bytes: config.max_recorder_bytes,
            file_extension: config.file_extension.clone(),
        };

        for user_id in member_ids {
            session.ensure_recorder(&user_id, store);
        }

        info!("Started recording session: {}", session.id);
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn initial_users(&self) -> &[UserId] {
        &self.initial_users
    }

    pub fn has_recorder(&self, user_id: &UserId) -> bool {
        self.recorders.contains_key(user_id)
    }

    fn filename_for(&self, user_id: &UserId) -> String {
        format!("{}-user-{}.{}", self.id, user_id, self.file_extension)
    }

    fn is_completed(&self, user_id: &UserId) -> bool {
        self.completed.iter().any(|d| &d.info.user_id == user_id)
    }

    /// Opens a recorder for the user unless one already exists or their
    /// recording for this session is already finalized. Called eagerly at
    /// start and lazily on first chunk from a late joiner.
    pub fn ensure_recorder(&mut self, user_id: &UserId, store: &RecordingStore) {
        if self.recorders.contains_key(user_id) || self.is_completed(user_id) {
            return;
        }
        let filename = self.filename_for(user_id);
        let sink = store.create_sink(&filename);
        info!("Started recording for user {}: {}", user_id, filename);
        self.recorders
            .insert(user_id.clone(), UserRecorder::new(user_id.clone(), filename, sink));
    }

    /// Appends a chunk to the user's recorder. `None` when the user has no
    /// recorder; callers ensure one first for members who joined mid-session.
    pub fn append(&mut self, user_id: &UserId, data: Bytes, index: Option<u64>) -> Option<ChunkAck> {
        let recorder = self.recorders.get_mut(user_id)?;
        Some(recorder.append(data, index))
    }

    /// True when the user's recorder has buffered past the configured cap.
    pub fn over_cap(&self, user_id: &UserId) -> bool {
        self.recorders
            .get(user_id)
            .is_some_and(|r| r.buffered_bytes() > self.max_recorder_bytes)
    }

    /// Finalizes and removes one user's recorder, retaining the descriptor
    /// for the session summary. Safe to call again for the same user: the
    /// recorder is gone, so the second call is a no-op.
    pub async fn finalize_user(
        &mut self,
        user_id: &UserId,
        store: &RecordingStore,
    ) -> Option<RecordingDescriptor> {
        let recorder = self.recorders.remove(user_id)?;
        let result = recorder.finalize(store).await;
        if let Some(descriptor) = &result {
            self.completed.push(descriptor.clone());
        }
        result
    }

    /// Live reassembly of one user's audio so far.
    pub fn recording_data(&self, user_id: &UserId) -> Option<RecordingData> {
        self.recorders.get(user_id)?.snapshot()
    }

    pub fn status(&self) -> RecordingStatus {
        RecordingStatus {
            is_recording: true,
            session_id: Some(self.id.clone()),
            active_recordings: self.recorders.keys().cloned().collect(),
            user_recording_stats: self
                .recorders
                .values()
                .map(|r| UserChunkStats {
                    user_id: r.user_id().clone(),
                    chunks: r.chunk_count(),
                    size: r.buffered_bytes(),
                })
                .collect(),
        }
    }

    /// Finalizes every remaining recorder, persists the session summary and
    /// consumes the session. The summary covers recordings finalized earlier
    /// in the session too, so a leaver's audio is accounted for.
    pub async fn finish(
        mut self,
        store: &RecordingStore,
    ) -> (SessionSummary, Vec<RecordingDescriptor>) {
        let user_ids: Vec<UserId> = self.recorders.keys().cloned().collect();
        for user_id in user_ids {
            self.finalize_user(&user_id, store).await;
        }
        let results = std::mem::take(&mut self.completed);

        let end = OffsetDateTime::now_utc();
        let summary = SessionSummary {
            session_id: self.id.clone(),
            room_id: self.room_id.clone(),
            start_time: self
                .started_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| self.start_ms.to_string()),
            end_time: end
                .format(&Rfc3339)
                .unwrap_or_else(|_| now_ms().to_string()),
            duration: now_ms().saturating_sub(self.start_ms),
            user_recordings: results.iter().map(|r| r.info.clone()).collect(),
            total_files: results.len(),
            total_size: results.iter().map(|r| r.info.size).sum(),
        };

        if let Err(e) = store.write_summary(&summary).await {
            warn!("Error saving session summary for {}: {}", summary.session_id, e);
        }

        info!(
            "Stopped recording session: {} ({} user recordings, {} total bytes)",
            summary.session_id, summary.total_files, summary.total_size
        );
        (summary, results)
    }
}
