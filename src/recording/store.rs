use std::path::PathBuf;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::protocol::SessionSummary;

/// Filesystem-backed store for per-user audio files and session summaries.
///
/// Sink writes are fire-and-forget: each sink runs its own writer task fed
/// by a channel, so a slow or failed disk never blocks chunk ingestion.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    root: PathBuf,
}

impl RecordingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the store directory if it does not exist yet.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Opens a streaming write sink. Never fails: an unopenable file is
    /// logged and the sink silently discards writes, leaving reconciliation
    /// at finalize time to produce the file from the in-memory buffer.
    pub fn create_sink(&self, filename: &str) -> SinkHandle {
        let path = self.path(filename);
        let (tx, rx) = flume::unbounded::<Bytes>();

        let task = tokio::spawn(async move {
            let mut file = match tokio::fs::File::create(&path).await {
                Ok(file) => file,
                Err(e) => {
                    warn!("Failed to open sink {}: {}", path.display(), e);
                    // Drain so senders never observe a closed channel.
                    while rx.recv_async().await.is_ok() {}
                    return 0;
                }
            };

            let mut written: u64 = 0;
            while let Ok(buf) = rx.recv_async().await {
                match file.write_all(&buf).await {
                    Ok(()) => written += buf.len() as u64,
                    Err(e) => {
                        warn!("Sink write failed for {}: {}", path.display(), e);
                        while rx.recv_async().await.is_ok() {}
                        break;
                    }
                }
            }

            if let Err(e) = file.flush().await {
                warn!("Sink flush failed for {}: {}", path.display(), e);
            }
            written
        });

        SinkHandle {
            tx: Some(tx),
            task,
        }
    }

    pub async fn write_file(&self, filename: &str, data: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(self.path(filename), data).await
    }

    pub async fn read_file(&self, filename: &str) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path(filename)).await
    }

    pub async fn file_size(&self, filename: &str) -> Option<u64> {
        tokio::fs::metadata(self.path(filename))
            .await
            .ok()
            .map(|m| m.len())
    }

    pub async fn delete(&self, filename: &str) -> std::io::Result<()> {
        tokio::fs::remove_file(self.path(filename)).await
    }

    /// Lists files in the store matching the given extension, with size and
    /// modification time in epoch millis.
    pub async fn list(&self, extension: &str) -> std::io::Result<Vec<StoredFile>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            files.push(StoredFile {
                filename: entry.file_name().to_string_lossy().to_string(),
                size: meta.len(),
                modified: epoch_ms(meta.modified().ok()),
            });
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(files)
    }

    pub async fn write_summary(&self, summary: &SessionSummary) -> std::io::Result<()> {
        let filename = format!("{}-summary.json", summary.session_id);
        let json = serde_json::to_vec_pretty(summary)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.write_file(&filename, &json).await?;
        debug!("Saved session summary: {}", filename);
        Ok(())
    }

    pub async fn read_summary(&self, session_id: &str) -> Option<SessionSummary> {
        let filename = format!("{session_id}-summary.json");
        let data = self.read_file(&filename).await.ok()?;
        serde_json::from_slice(&data).ok()
    }

    /// All persisted session summaries, newest first.
    pub async fn list_summaries(&self) -> std::io::Result<Vec<SessionSummary>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut summaries = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with("-summary.json") {
                continue;
            }
            match tokio::fs::read(entry.path()).await {
                Ok(data) => match serde_json::from_slice::<SessionSummary>(&data) {
                    Ok(summary) => summaries.push(summary),
                    Err(e) => warn!("Skipping unreadable summary {}: {}", name, e),
                },
                Err(e) => warn!("Skipping unreadable summary {}: {}", name, e),
            }
        }

        summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(summaries)
    }
}

/// Listing entry for one stored file.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub filename: String,
    pub size: u64,
    /// Last modification time in epoch millis.
    pub modified: u64,
}

/// Handle to one streaming sink. Dropping or closing it ends the writer task.
#[derive(Debug)]
pub struct SinkHandle {
    tx: Option<flume::Sender<Bytes>>,
    task: tokio::task::JoinHandle<u64>,
}

impl SinkHandle {
    /// Queues bytes for the writer task. Never blocks.
    pub fn write(&self, data: Bytes) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(data);
        }
    }

    /// Closes the sink and waits for queued writes to land, returning the
    /// number of bytes the writer actually put on disk.
    pub async fn close(mut self) -> u64 {
        self.tx.take();
        self.task.await.unwrap_or(0)
    }
}

fn epoch_ms(time: Option<std::time::SystemTime>) -> u64 {
    time.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
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

    #[tokio::test]
    async fn sink_persists_queued_writes() {
        let store = temp_store();
        let sink = store.create_sink("a.webm");
        sink.write(Bytes::from_static(&[1, 2, 3]));
        sink.write(Bytes::from_static(&[4, 5]));
        let written = sink.close().await;

        assert_eq!(written, 5);
        assert_eq!(
            store.read_file("a.webm").await.expect("read back"),
            vec![1, 2, 3, 4, 5]
        );
    }

    #[tokio::test]
    async fn summary_roundtrip() {
        let store = temp_store();
        let summary = SessionSummary {
            session_id: "session-r1-t".to_string().into(),
            room_id: "r1".into(),
            start_time: "2026-01-01T00:00:00Z".to_string(),
            end_time: "2026-01-01T00:01:00Z".to_string(),
            duration: 60_000,
            user_recordings: vec![],
            total_files: 0,
            total_size: 0,
        };
        store.write_summary(&summary).await.expect("write summary");

        let loaded = store.read_summary("session-r1-t").await.expect("load");
        assert_eq!(loaded.room_id, summary.room_id);
        assert_eq!(loaded.duration, 60_000);

        let all = store.list_summaries().await.expect("list");
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn filename_safety() {
        assert!(is_safe_filename("session-r1-user-a.webm"));
        assert!(!is_safe_filename("../etc/passwd"));
        assert!(!is_safe_filename("a/b.webm"));
        assert!(!is_safe_filename(""));
    }
}
