use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot create storage directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Recorded audio lost, cannot write chunk {path}: {source}")]
    ChunkLost {
        path: PathBuf,
        source: std::io::Error,
    },
}
