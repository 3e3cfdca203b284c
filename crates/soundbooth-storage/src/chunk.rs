use crossbeam_channel::Sender;
use parking_lot::Mutex;
use soundbooth_foundation::{BatchConsumer, SessionToken};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::StorageError;
use crate::naming::{chunk_file_name, ChunkBuffer};

struct ChunkState {
    buffer: ChunkBuffer,
    index: u64,
    failed: bool,
}

/// Persists the raw stream as fixed-size chunk files with strictly
/// increasing indices. Recorded audio must never be lost silently: a
/// write failure is reported as a typed fatal error to the supervisor
/// channel and the sink disables itself.
pub struct ChunkFileSink {
    dir: PathBuf,
    recorder_id: String,
    session: SessionToken,
    state: Mutex<ChunkState>,
    failure_tx: Option<Sender<StorageError>>,
}

impl ChunkFileSink {
    pub fn new(
        dir: impl AsRef<Path>,
        recorder_id: impl Into<String>,
        chunk_size: usize,
    ) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        Ok(Self {
            dir,
            recorder_id: recorder_id.into(),
            session: SessionToken::now(),
            state: Mutex::new(ChunkState {
                buffer: ChunkBuffer::new(chunk_size),
                index: 0,
                failed: false,
            }),
            failure_tx: None,
        })
    }

    /// Route write failures to a supervisor instead of logging only.
    pub fn with_failure_channel(mut self, tx: Sender<StorageError>) -> Self {
        self.failure_tx = Some(tx);
        self
    }

    pub fn session(&self) -> SessionToken {
        self.session
    }

    /// Bytes accumulated below one chunk, kept in memory.
    pub fn pending_bytes(&self) -> usize {
        self.state.lock().buffer.pending()
    }

    fn write_chunk(&self, index: u64, chunk: &[u8]) -> Result<(), StorageError> {
        let name = chunk_file_name(&self.recorder_id, &self.session, index);
        let path = self.dir.join(name);
        fs::write(&path, chunk).map_err(|source| StorageError::ChunkLost { path, source })
    }
}

impl BatchConsumer<Vec<u8>> for ChunkFileSink {
    fn consume(&self, batch: Arc<Vec<u8>>) {
        let mut state = self.state.lock();
        if state.failed {
            return;
        }

        state.buffer.push(&batch);
        while let Some(chunk) = state.buffer.pop_chunk() {
            if let Err(e) = self.write_chunk(state.index, &chunk) {
                tracing::error!("{}", e);
                state.failed = true;
                if let Some(tx) = &self.failure_tx {
                    let _ = tx.send(e);
                }
                return;
            }
            state.index += 1;
        }
    }
}
