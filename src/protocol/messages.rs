use serde::Deserialize;
use serde_json::Value;

use crate::common::{RoomId, UserId};

/// Messages sent from client to server over the WebSocket.
///
/// Every payload is validated here at the boundary before it reaches room
/// state: serde enforces the field set per tag, and empty identifiers are
/// rejected by the dispatcher.
#[derive(Deserialize, Debug)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum IncomingMessage {
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    LeaveRoom {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    StartRecording {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    StopRecording {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    AudioChunk {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        /// Base64-encoded audio payload.
        #[serde(rename = "audioData")]
        audio_data: String,
        /// Producer-side ordering hint. Chunks without one fall back to
        /// arrival order at reassembly time.
        #[serde(rename = "chunkIndex")]
        chunk_index: Option<u64>,
    },
    GetRecording {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        /// Defaults to the requesting user's own recording.
        #[serde(rename = "userId")]
        user_id: Option<UserId>,
    },
    GetRecordingStatus {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    WebrtcOffer {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "targetUserId")]
        target_user_id: UserId,
        payload: Value,
    },
    WebrtcAnswer {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "targetUserId")]
        target_user_id: UserId,
        payload: Value,
    },
    WebrtcIceCandidate {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "targetUserId")]
        target_user_id: UserId,
        payload: Value,
    },
    GetRoomInfo {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_room() {
        let msg: IncomingMessage =
            serde_json::from_str(r#"{"op":"join-room","roomId":"r1","userId":"alice"}"#)
                .expect("parse should succeed");
        match msg {
            IncomingMessage::JoinRoom { room_id, user_id } => {
                assert_eq!(&*room_id, "r1");
                assert_eq!(&*user_id, "alice");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parses_audio_chunk_with_and_without_index() {
        let with: IncomingMessage = serde_json::from_str(
            r#"{"op":"audio-chunk","roomId":"r1","audioData":"AQID","chunkIndex":4}"#,
        )
        .expect("parse should succeed");
        match with {
            IncomingMessage::AudioChunk { chunk_index, .. } => assert_eq!(chunk_index, Some(4)),
            other => panic!("unexpected variant: {other:?}"),
        }

        let without: IncomingMessage =
            serde_json::from_str(r#"{"op":"audio-chunk","roomId":"r1","audioData":"AQID"}"#)
                .expect("parse should succeed");
        match without {
            IncomingMessage::AudioChunk { chunk_index, .. } => assert_eq!(chunk_index, None),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parses_signaling_payload_untouched() {
        let msg: IncomingMessage = serde_json::from_str(
            r#"{"op":"webrtc-offer","roomId":"r1","targetUserId":"bob","payload":{"sdp":"v=0"}}"#,
        )
        .expect("parse should succeed");
        match msg {
            IncomingMessage::WebrtcOffer {
                target_user_id,
                payload,
                ..
            } => {
                assert_eq!(&*target_user_id, "bob");
                assert_eq!(payload["sdp"], "v=0");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_op_and_missing_fields() {
        assert!(serde_json::from_str::<IncomingMessage>(r#"{"op":"warp-room"}"#).is_err());
        assert!(
            serde_json::from_str::<IncomingMessage>(r#"{"op":"join-room","roomId":"r1"}"#).is_err()
        );
    }
}
