use serde::Serialize;
use serde_json::Value;

use crate::common::{ConnectionId, RoomId, SessionId, UserId};
use crate::protocol::models::{
    RecordingDescriptor, RecordingStatus, RoomMemberInfo, SessionSummary, UserRecordingInfo,
};

/// Messages sent from server to client over the WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum OutgoingMessage {
    RoomJoined {
        success: bool,
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "userId")]
        user_id: UserId,
        /// Other members already present, in join order.
        users: Vec<RoomMemberInfo>,
        #[serde(rename = "isRecording")]
        is_recording: bool,
        #[serde(rename = "totalUsers")]
        total_users: usize,
        timestamp: u64,
    },
    RoomJoinError {
        error: String,
    },
    UserJoined {
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "socketId")]
        socket_id: ConnectionId,
        timestamp: u64,
    },
    UserLeft {
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: u64,
        #[serde(rename = "remainingUsers")]
        remaining_users: usize,
    },
    RoomUpdated {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "totalUsers")]
        total_users: usize,
        users: Vec<RoomMemberInfo>,
    },
    RecordingStarted {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        timestamp: u64,
    },
    RecordingStartResponse {
        success: bool,
        #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    RecordingStopped {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "userRecordings")]
        user_recordings: Vec<UserRecordingInfo>,
        #[serde(rename = "totalFiles")]
        total_files: usize,
        #[serde(rename = "totalSize")]
        total_size: u64,
    },
    RecordingStopResponse {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<SessionSummary>,
        #[serde(rename = "userRecordings", skip_serializing_if = "Option::is_none")]
        user_recordings: Option<Vec<RecordingDescriptor>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    AudioChunkReceived {
        success: bool,
        #[serde(rename = "chunkIndex", skip_serializing_if = "Option::is_none")]
        chunk_index: Option<u64>,
        #[serde(rename = "totalChunks", skip_serializing_if = "Option::is_none")]
        total_chunks: Option<usize>,
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Live relay of one user's audio to the rest of the room.
    AudioData {
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "audioData")]
        audio_data: String,
    },
    GetRecordingResponse {
        success: bool,
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        #[serde(rename = "audioData")]
        audio_data: Option<String>,
        size: u64,
        chunks: usize,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    RecordingStatusResponse {
        success: bool,
        #[serde(rename = "roomId", skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        #[serde(flatten)]
        status: Option<RecordingStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    RoomInfoResponse {
        #[serde(rename = "roomId", skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        users: Option<Vec<RoomMemberInfo>>,
        #[serde(rename = "totalUsers", skip_serializing_if = "Option::is_none")]
        total_users: Option<usize>,
        #[serde(rename = "isRecording", skip_serializing_if = "Option::is_none")]
        is_recording: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    WebrtcOffer {
        #[serde(rename = "fromUserId")]
        from_user_id: UserId,
        #[serde(rename = "targetUserId")]
        target_user_id: UserId,
        payload: Value,
    },
    WebrtcAnswer {
        #[serde(rename = "fromUserId")]
        from_user_id: UserId,
        #[serde(rename = "targetUserId")]
        target_user_id: UserId,
        payload: Value,
    },
    WebrtcIceCandidate {
        #[serde(rename = "fromUserId")]
        from_user_id: UserId,
        #[serde(rename = "targetUserId")]
        target_user_id: UserId,
        payload: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tags_are_kebab_case() {
        let msg = OutgoingMessage::UserJoined {
            user_id: "alice".into(),
            socket_id: ConnectionId::generate(),
            timestamp: 1,
        };
        let json: Value = serde_json::to_value(&msg).expect("serialize should succeed");
        assert_eq!(json["op"], "user-joined");
        assert_eq!(json["userId"], "alice");
    }

    #[test]
    fn none_fields_are_omitted_from_responses() {
        let msg = OutgoingMessage::RecordingStartResponse {
            success: false,
            session_id: None,
            message: None,
            error: Some("Recording already in progress".to_string()),
        };
        let json: Value = serde_json::to_value(&msg).expect("serialize should succeed");
        assert_eq!(json["op"], "recording-start-response");
        assert_eq!(json["success"], false);
        assert!(json.get("sessionId").is_none());
        assert_eq!(json["error"], "Recording already in progress");
    }
}
