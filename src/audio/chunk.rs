use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RecorderError;

/// Finalize configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeConfig {
    /// Chunk count above which finalize yields between batches (default: 1000)
    pub yield_threshold: usize,
    /// Chunks copied per batch before yielding (default: 256)
    pub batch_size: usize,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            yield_threshold: 1000,
            batch_size: 256,
        }
    }
}

/// One encoded slice of audio delivered on a tick
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Arrival index within the session (0-indexed)
    pub sequence: u64,
    /// Encoded bytes
    pub data: Bytes,
    /// Session-relative capture time of the tick in milliseconds
    pub captured_at_ms: u64,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Arrival-ordered store of a session's chunks
///
/// Appends never concatenate; the single copy happens in `finalize`.
#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    chunks: Vec<Chunk>,
    total_bytes: usize,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `chunk` after the ones already received; empty chunks are skipped
    pub fn append(&mut self, chunk: Chunk) {
        if chunk.is_empty() {
            debug!("Skipping empty chunk {}", chunk.sequence);
            return;
        }
        self.total_bytes += chunk.len();
        debug!(
            "Chunk {} appended ({} bytes, {} total)",
            chunk.sequence,
            chunk.len(),
            self.total_bytes
        );
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

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Drop every chunk and return the backing allocation
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.chunks.shrink_to_fit();
        self.total_bytes = 0;
    }

    /// Concatenate all chunks in arrival order into one buffer
    ///
    /// Above `config.yield_threshold` chunks the copy runs in batches of
    /// `config.batch_size` with a yield to the scheduler between them.
    /// Afterwards each chunk points at its own range of the result, so the
    /// sequence stays inspectable without holding a second copy.
    pub async fn finalize(&mut self, config: &FinalizeConfig) -> Result<Bytes, RecorderError> {
        if self.chunks.is_empty() {
            return Err(RecorderError::EmptySession);
        }

        let mut buffer = BytesMut::with_capacity(self.total_bytes);
        let batched = self.chunks.len() > config.yield_threshold;

        if batched {
            let batch_size = config.batch_size.max(1);
            for batch in self.chunks.chunks(batch_size) {
                for chunk in batch {
                    buffer.extend_from_slice(&chunk.data);
                }
                tokio::task::yield_now().await;
            }
        } else {
            for chunk in &self.chunks {
                buffer.extend_from_slice(&chunk.data);
            }
        }

        let artifact = buffer.freeze();
        let mut offset = 0;
        for chunk in &mut self.chunks {
            let end = offset + chunk.data.len();
            chunk.data = artifact.slice(offset..end);
            offset = end;
        }

        info!(
            "Finalized {} chunks into {} bytes{}",
            self.chunks.len(),
            artifact.len(),
            if batched { " (batched)" } else { "" }
        );

        Ok(artifact)
    }
}
