use serde::Serialize;
use thiserror::Error;

use crate::common::types::now_ms;

/// Failures surfaced by room and recording operations.
///
/// Every variant rejects without mutating any state, and its display string
/// is the exact message clients see on the wire. Store I/O failures never
/// reach this enum; they degrade to a logged `false`/`None` for the single
/// user/file involved.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Missing {0}")]
    Validation(&'static str),

    #[error("Room not found")]
    RoomNotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Recording not found")]
    RecordingNotFound,

    #[error("Invalid filename")]
    InvalidFilename,

    #[error("Recording already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,
}

/// JSON error response body for the REST API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// HTTP status code.
    pub status: u16,
    /// HTTP status reason phrase (e.g. "Not Found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// The request path that caused the error.
    pub path: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: now_ms(),
            status: 400,
            error: "Bad Request".into(),
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: now_ms(),
            status: 404,
            error: "Not Found".into(),
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn internal(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp: now_ms(),
            status: 500,
            error: "Internal Server Error".into(),
            message: message.into(),
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_match_wire_strings() {
        assert_eq!(
            RoomError::Validation("roomId or userId").to_string(),
            "Missing roomId or userId"
        );
        assert_eq!(RoomError::RoomNotFound.to_string(), "Room not found");
        assert_eq!(
            RoomError::AlreadyRecording.to_string(),
            "Recording already in progress"
        );
        assert_eq!(
            RoomError::NotRecording.to_string(),
            "No recording in progress"
        );
    }
}
