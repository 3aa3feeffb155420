use serde::{Deserialize, Serialize};

use crate::common::{ConnectionId, RoomId, SessionId, UserId};

/// Public view of one room member, as sent in `room-joined` and
/// `room-updated` payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMemberInfo {
    pub user_id: UserId,
    pub socket_id: ConnectionId,
    pub joined_at: u64,
}

/// One finalized per-user recording: metadata plus the reassembled payload
/// transfer-encoded for immediate client consumption.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingDescriptor {
    #[serde(flatten)]
    pub info: UserRecordingInfo,
    pub base64: String,
}

/// Recording metadata without the payload, persisted into session summaries
/// and broadcast in `recording-stopped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecordingInfo {
    pub user_id: UserId,
    pub filename: String,
    pub size: u64,
    pub chunks: usize,
    pub duration: u64,
}

/// Durable per-session summary, persisted as `<sessionId>-summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub start_time: String,
    pub end_time: String,
    pub duration: u64,
    pub user_recordings: Vec<UserRecordingInfo>,
    pub total_files: usize,
    pub total_size: u64,
}

/// Non-mutating snapshot of an active recording session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatus {
    pub is_recording: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub active_recordings: Vec<UserId>,
    pub user_recording_stats: Vec<UserChunkStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChunkStats {
    pub user_id: UserId,
    pub chunks: usize,
    pub size: u64,
}

/// Reassembled audio for one user while a session is still live, served by
/// `get-recording`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingData {
    pub user_id: UserId,
    pub audio_data: String,
    pub size: u64,
    pub chunks: usize,
}

/// Acknowledgement data for one accepted audio chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkAck {
    pub chunk_index: u64,
    pub total_chunks: usize,
}
