pub mod chunk;
pub mod error;
pub mod fifo;
pub mod http;
pub mod naming;

pub use chunk::ChunkFileSink;
pub use error::StorageError;
pub use fifo::FifoSink;
pub use http::HttpSink;
pub use naming::{chunk_file_name, ChunkBuffer};
