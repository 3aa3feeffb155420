use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::common::{UserId, now_ms};
use crate::protocol::{ChunkAck, RecordingData, RecordingDescriptor, UserRecordingInfo};
use crate::recording::store::{RecordingStore, SinkHandle};

/// One buffered audio chunk. The in-memory list is authoritative for final
/// reassembly; the sink copy is best-effort.
#[derive(Debug)]
struct AudioChunk {
    data: Bytes,
    index: Option<u64>,
    arrival_seq: u64,
}

/// Accumulates one user's audio chunks for the duration of a session.
#[derive(Debug)]
pub struct UserRecorder {
    user_id: UserId,
    filename: String,
    chunks: Vec<AudioChunk>,
    total_bytes: u64,
    sink: Option<SinkHandle>,
    started_at_ms: u64,
}

impl UserRecorder {
    pub fn new(user_id: UserId, filename: String, sink: SinkHandle) -> Self {
        Self {
            user_id,
            filename,
            chunks: Vec::new(),
            total_bytes: 0,
            sink: Some(sink),
            started_at_ms: now_ms(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn buffered_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Appends a chunk to the in-memory list and streams a copy to the sink.
    pub fn append(&mut self, data: Bytes, index: Option<u64>) -> ChunkAck {
        let arrival_seq = self.chunks.len() as u64;
        let chunk_index = index.unwrap_or(arrival_seq);

        self.total_bytes += data.len() as u64;
        if let Some(sink) = &self.sink {
            sink.write(data.clone());
        }
        self.chunks.push(AudioChunk {
            data,
            index,
            arrival_seq,
        });

        ChunkAck {
            chunk_index,
            total_chunks: self.chunks.len(),
        }
    }

    /// Reassembles buffered chunks into one contiguous buffer.
    ///
    /// Stable sort by explicit index where present, arrival sequence
    /// otherwise; ties resolved by arrival sequence. Index-less chunks
    /// therefore keep arrival order, which under multi-path delivery is a
    /// known limitation rather than a producer-order guarantee.
    fn assemble(&self) -> Vec<u8> {
        let mut order: Vec<&AudioChunk> = self.chunks.iter().collect();
        order.sort_by_key(|c| (c.index.unwrap_or(c.arrival_seq), c.arrival_seq));

        let mut combined = Vec::with_capacity(self.total_bytes as usize);
        for chunk in order {
            combined.extend_from_slice(&chunk.data);
        }
        combined
    }

    /// Non-destructive reassembly for "give me my audio so far" queries.
    pub fn snapshot(&self) -> Option<RecordingData> {
        if self.chunks.is_empty() {
            return None;
        }
        let combined = self.assemble();
        Some(RecordingData {
            user_id: self.user_id.clone(),
            audio_data: BASE64.encode(&combined),
            size: combined.len() as u64,
            chunks: self.chunks.len(),
        })
    }

    /// Closes the sink and produces the final recording.
    ///
    /// Returns `None` when no chunks were ever appended. Otherwise the
    /// reassembled buffer is reconciled against the on-disk sink result:
    /// a missing or zero-byte file is overwritten with the buffer, so a
    /// failed sink never loses a recording.
    pub async fn finalize(mut self, store: &RecordingStore) -> Option<RecordingDescriptor> {
        let sink_written = match self.sink.take() {
            Some(sink) => sink.close().await,
            None => 0,
        };

        if self.chunks.is_empty() {
            debug!("No audio chunks for user {}", self.user_id);
            return None;
        }

        let combined = self.assemble();

        let on_disk = store.file_size(&self.filename).await.unwrap_or(0);
        if sink_written == 0 || on_disk == 0 {
            if let Err(e) = store.write_file(&self.filename, &combined).await {
                warn!("Failed to save recording {}: {}", self.filename, e);
            }
        }

        debug!(
            "Saved recording for user {}: {} ({} bytes, {} chunks)",
            self.user_id,
            self.filename,
            combined.len(),
            self.chunks.len()
        );

        Some(RecordingDescriptor {
            info: UserRecordingInfo {
                user_id: self.user_id,
                filename: self.filename,
                size: combined.len() as u64,
                chunks: self.chunks.len(),
                duration: now_ms().saturating_sub(self.started_at_ms),
            },
            base64: BASE64.encode(&combined),
        })
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

    fn recorder(store: &RecordingStore, name: &str) -> UserRecorder {
        UserRecorder::new("alice".into(), name.to_string(), store.create_sink(name))
    }

    #[tokio::test]
    async fn indexed_chunks_reassemble_in_index_order() {
        let store = temp_store();
        let mut rec = recorder(&store, "ordered.webm");

        // Arrival order [1, 0]: second chunk carries the lower index.
        rec.append(Bytes::from_static(&[4, 5]), Some(1));
        rec.append(Bytes::from_static(&[1, 2, 3]), Some(0));

        let result = rec.finalize(&store).await.expect("descriptor");
        assert_eq!(result.info.size, 5);
        assert_eq!(result.info.chunks, 2);
        assert_eq!(BASE64.decode(&result.base64).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn reassembly_is_permutation_independent() {
        let parts: [&[u8]; 4] = [b"aa", b"b", b"ccc", b"d"];
        let perms: [[usize; 4]; 3] = [[3, 1, 0, 2], [2, 0, 3, 1], [0, 1, 2, 3]];

        for perm in perms {
            let store = temp_store();
            let mut rec = recorder(&store, "perm.webm");
            for &i in &perm {
                rec.append(Bytes::copy_from_slice(parts[i]), Some(i as u64));
            }
            let result = rec.finalize(&store).await.expect("descriptor");
            assert_eq!(BASE64.decode(&result.base64).unwrap(), b"aabcccd");
        }
    }

    #[tokio::test]
    async fn chunks_without_index_keep_arrival_order() {
        let store = temp_store();
        let mut rec = recorder(&store, "arrival.webm");
        rec.append(Bytes::from_static(b"x"), None);
        rec.append(Bytes::from_static(b"y"), None);
        rec.append(Bytes::from_static(b"z"), None);

        let result = rec.finalize(&store).await.expect("descriptor");
        assert_eq!(BASE64.decode(&result.base64).unwrap(), b"xyz");
    }

    #[tokio::test]
    async fn duplicate_indices_tie_break_by_arrival() {
        let store = temp_store();
        let mut rec = recorder(&store, "ties.webm");
        rec.append(Bytes::from_static(b"1st"), Some(7));
        rec.append(Bytes::from_static(b"2nd"), Some(7));

        let result = rec.finalize(&store).await.expect("descriptor");
        assert_eq!(BASE64.decode(&result.base64).unwrap(), b"1st2nd");
    }

    #[tokio::test]
    async fn zero_chunks_finalize_returns_none() {
        let store = temp_store();
        let rec = recorder(&store, "empty.webm");
        assert!(rec.finalize(&store).await.is_none());
    }

    #[tokio::test]
    async fn snapshot_is_non_destructive() {
        let store = temp_store();
        let mut rec = recorder(&store, "snap.webm");
        rec.append(Bytes::from_static(&[9, 9]), Some(0));

        let snap = rec.snapshot().expect("snapshot");
        assert_eq!(snap.size, 2);
        assert_eq!(snap.chunks, 1);

        // Recorder still usable and finalizable after the snapshot.
        rec.append(Bytes::from_static(&[8]), Some(1));
        let result = rec.finalize(&store).await.expect("descriptor");
        assert_eq!(result.info.size, 3);
    }

    #[tokio::test]
    async fn finalize_writes_file_even_without_working_sink() {
        let store = temp_store();
        // Sink rooted at a directory that cannot be created as a file.
        let broken = RecordingStore::new(store.path("missing-subdir"));
        let mut rec = UserRecorder::new(
            "alice".into(),
            "rescue.webm".to_string(),
            broken.create_sink("rescue.webm"),
        );
        rec.append(Bytes::from_static(&[1, 2, 3]), Some(0));

        let result = rec.finalize(&store).await.expect("descriptor");
        assert_eq!(result.info.size, 3);
        assert_eq!(
            store.read_file("rescue.webm").await.expect("reconciled"),
            vec![1, 2, 3]
        );
    }
}
