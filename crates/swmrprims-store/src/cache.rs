use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

/// A contiguous run of staged frames ready to be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyRun {
    /// Byte offset relative to the start of the dataset's frame data.
    pub offset: usize,
    /// Encoded frame bytes.
    pub bytes: Bytes,
}

struct CachedChunk {
    data: BytesMut,
    dirty: Vec<bool>,
}

/// Write-back cache of dataset chunks.
///
/// Frames are staged per chunk and only reach the file on eviction or
/// [`ChunkCache::drain`]. Dirtiness is tracked per frame so a write-back never
/// overwrites frames this cache did not stage.
pub struct ChunkCache {
    frame_bytes: usize,
    chunk_depth: usize,
    max_chunks: usize,
    chunks: BTreeMap<usize, CachedChunk>,
}

impl ChunkCache {
    /// Create a cache holding as many whole chunks as fit in `capacity_bytes`
    /// (always at least one).
    pub fn new(capacity_bytes: usize, frame_bytes: usize, chunk_depth: usize) -> Self {
        let chunk_bytes = frame_bytes.saturating_mul(chunk_depth).max(1);
        Self {
            frame_bytes,
            chunk_depth,
            max_chunks: (capacity_bytes / chunk_bytes).max(1),
            chunks: BTreeMap::new(),
        }
    }

    /// Maximum number of chunks held before evicting.
    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    /// Number of chunks currently cached.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Stage whole frames starting at `first_frame`. `bytes` must not cross a
    /// chunk boundary. Returns the runs of any chunk evicted to make room.
    pub fn stage(&mut self, first_frame: usize, bytes: &[u8]) -> Vec<DirtyRun> {
        debug_assert_eq!(bytes.len() % self.frame_bytes, 0);
        let chunk_index = first_frame / self.chunk_depth;
        let within = first_frame % self.chunk_depth;
        let frames = bytes.len() / self.frame_bytes;
        debug_assert!(within + frames <= self.chunk_depth);

        let mut evicted = Vec::new();
        if !self.chunks.contains_key(&chunk_index) && self.chunks.len() >= self.max_chunks {
            if let Some((index, chunk)) = self.chunks.pop_first() {
                evicted = self.runs(index, chunk);
            }
        }

        let frame_bytes = self.frame_bytes;
        let chunk_depth = self.chunk_depth;
        let chunk = self
            .chunks
            .entry(chunk_index)
            .or_insert_with(|| CachedChunk {
                data: BytesMut::zeroed(frame_bytes * chunk_depth),
                dirty: vec![false; chunk_depth],
            });
        let start = within * frame_bytes;
        chunk.data[start..start + bytes.len()].copy_from_slice(bytes);
        chunk.dirty[within..within + frames].fill(true);

        evicted
    }

    /// Remove every cached chunk, returning their dirty runs in file order.
    pub fn drain(&mut self) -> Vec<DirtyRun> {
        let chunks = std::mem::take(&mut self.chunks);
        chunks
            .into_iter()
            .flat_map(|(index, chunk)| self.runs(index, chunk))
            .collect()
    }

    fn runs(&self, chunk_index: usize, chunk: CachedChunk) -> Vec<DirtyRun> {
        let data = chunk.data.freeze();
        let base = chunk_index * self.chunk_depth;
        let mut runs = Vec::new();
        let mut frame = 0usize;
        while frame < chunk.dirty.len() {
            if !chunk.dirty[frame] {
                frame += 1;
                continue;
            }
            let start = frame;
            while frame < chunk.dirty.len() && chunk.dirty[frame] {
                frame += 1;
            }
            runs.push(DirtyRun {
                offset: (base + start) * self.frame_bytes,
                bytes: data.slice(start * self.frame_bytes..frame * self.frame_bytes),
            });
        }
        runs
    }
}
