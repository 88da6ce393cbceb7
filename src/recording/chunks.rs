//! Accumulation and finalization of encoded chunks

use bytes::{Bytes, BytesMut};

use super::config::RecordingStats;

/// Encoded chunks of one session, in arrival order
#[derive(Debug, Clone, Default)]
pub struct ChunkSequence {
    chunks: Vec<Bytes>,
    total_bytes: usize,
}

impl ChunkSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks are kept so the count matches what the
    /// encoder emitted.
    pub fn push(&mut self, chunk: Bytes) {
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.chunks.iter()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }

    /// All chunks joined in order
    pub fn concat(&self) -> Bytes {
        let mut joined = BytesMut::with_capacity(self.total_bytes);
        for chunk in &self.chunks {
            joined.extend_from_slice(chunk);
        }
        joined.freeze()
    }

    /// Join the chunks into one media object and empty the sequence
    pub fn finalize(
        &mut self,
        mime_type: String,
        extension: &'static str,
        stats: RecordingStats,
    ) -> FinalizedMedia {
        let media = FinalizedMedia {
            data: self.concat(),
            mime_type,
            extension,
            chunk_count: self.chunks.len(),
            stats,
        };
        self.clear();
        media
    }
}

/// A finished recording, ready to be written out
#[derive(Debug, Clone)]
pub struct FinalizedMedia {
    pub data: Bytes,
    /// MIME type the session was configured with
    pub mime_type: String,
    pub extension: &'static str,
    pub chunk_count: usize,
    pub stats: RecordingStats,
}

impl FinalizedMedia {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
