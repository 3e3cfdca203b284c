use soundbooth_foundation::{unix_nanos, SessionToken};

/// Chunk file name scheme shared by the file writer and the HTTP
/// uploader: recorder identity, session token, zero-padded chunk index,
/// per-chunk creation timestamp.
pub fn chunk_file_name(recorder_id: &str, session: &SessionToken, index: u64) -> String {
    format!(
        "{}_{}_{:016}_{}.raw",
        recorder_id,
        session,
        index,
        unix_nanos()
    )
}

/// Accumulates the continuous byte stream and hands out fixed-size
/// chunks. Callers provide their own locking; the hub may invoke a sink
/// for overlapping cycles concurrently.
pub struct ChunkBuffer {
    buf: Vec<u8>,
    chunk_size: usize,
}

impl ChunkBuffer {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(chunk_size * 2),
            chunk_size,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract exactly one chunk's worth, or nothing if less than a full
    /// chunk has accumulated. Remainders are retained indefinitely.
    pub fn pop_chunk(&mut self) -> Option<Vec<u8>> {
        if self.buf.len() < self.chunk_size {
            return None;
        }
        Some(self.buf.drain(..self.chunk_size).collect())
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
