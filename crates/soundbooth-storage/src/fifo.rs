use parking_lot::Mutex;
use soundbooth_foundation::BatchConsumer;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Forwards every received buffer verbatim into a pre-existing named
/// pipe, e.g. for a streaming service on the other end. If the pipe
/// cannot be opened at construction the sink is inert rather than
/// failing the process.
pub struct FifoSink {
    path: PathBuf,
    file: Option<Mutex<File>>,
}

impl FifoSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match OpenOptions::new().append(true).open(&path) {
            Ok(f) => Some(Mutex::new(f)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "Cannot open fifo, live passthrough disabled: {}",
                    e
                );
                None
            }
        };
        Self { path, file }
    }

    pub fn is_active(&self) -> bool {
        self.file.is_some()
    }

    fn write_all_looped(&self, file: &mut File, bytes: &[u8]) {
        let mut written = 0;
        while written < bytes.len() {
            match file.write(&bytes[written..]) {
                Ok(0) => {
                    tracing::warn!(path = %self.path.display(), "Fifo accepted no bytes");
                    return;
                }
                Ok(n) => written += n,
                Err(e) => {
                    // This store call is abandoned; the sink stays usable.
                    tracing::warn!(path = %self.path.display(), "Cannot write into fifo: {}", e);
                    return;
                }
            }
        }
    }
}

impl BatchConsumer<Vec<u8>> for FifoSink {
    fn consume(&self, batch: Arc<Vec<u8>>) {
        if let Some(file) = &self.file {
            let mut file = file.lock();
            self.write_all_looped(&mut file, &batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_makes_the_sink_inert() {
        let sink = FifoSink::new("/nonexistent/fifo/path");
        assert!(!sink.is_active());
        // store is a no-op, not a panic
        sink.consume(Arc::new(vec![1, 2, 3]));
    }

    #[test]
    fn forwards_buffers_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        std::fs::write(&path, b"").unwrap();

        let sink = FifoSink::new(&path);
        assert!(sink.is_active());
        sink.consume(Arc::new(vec![1, 2, 3]));
        sink.consume(Arc::new(vec![4, 5]));

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5]);
    }
}
