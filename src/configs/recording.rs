use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory where per-user audio files and session summaries land.
    pub directory: String,
    /// Per-recorder buffered byte cap. A recorder that exceeds it is
    /// force-finalized so an unbounded recording cannot exhaust memory.
    pub max_recorder_bytes: u64,
    /// File extension for per-user recordings.
    pub file_extension: String,
    /// MIME type reported back to clients.
    pub mime_type: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: "recordings".to_string(),
            max_recorder_bytes: 256 * 1024 * 1024,
            file_extension: "webm".to_string(),
            mime_type: "audio/webm".to_string(),
        }
    }
}
