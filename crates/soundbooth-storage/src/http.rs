use parking_lot::Mutex;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use soundbooth_foundation::{BatchConsumer, SessionToken};
use std::sync::Arc;

use crate::naming::{chunk_file_name, ChunkBuffer};

/// Form-file field name the upload endpoint expects.
const FORM_FIELD: &str = "raw_audio";

struct UploadState {
    buffer: ChunkBuffer,
    index: u64,
}

/// Uploads the raw stream in fixed-size chunks as synchronous multipart
/// POSTs. Network and non-2xx failures are logged and dropped; the sink
/// stays usable and keeps accumulating.
pub struct HttpSink {
    endpoint: String,
    recorder_id: String,
    session: SessionToken,
    client: Client,
    state: Mutex<UploadState>,
}

impl HttpSink {
    pub fn new(
        endpoint: impl Into<String>,
        recorder_id: impl Into<String>,
        chunk_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            recorder_id: recorder_id.into(),
            session: SessionToken::now(),
            client: Client::new(),
            state: Mutex::new(UploadState {
                buffer: ChunkBuffer::new(chunk_size),
                index: 0,
            }),
        }
    }

    pub fn pending_bytes(&self) -> usize {
        self.state.lock().buffer.pending()
    }

    fn upload(&self, name: String, chunk: Vec<u8>) {
        let part = match Part::bytes(chunk)
            .file_name(name)
            .mime_str("application/octet-stream")
        {
            Ok(part) => part,
            Err(e) => {
                tracing::warn!("Cannot build multipart chunk: {}", e);
                return;
            }
        };
        let form = Form::new().part(FORM_FIELD, part);

        match self.client.post(&self.endpoint).multipart(form).send() {
            Ok(response) if response.status().is_success() => {
                tracing::trace!(endpoint = %self.endpoint, "Chunk uploaded");
            }
            Ok(response) => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    status = %response.status(),
                    "Chunk upload rejected"
                );
            }
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, "Cannot upload chunk: {}", e);
            }
        }
    }
}

impl BatchConsumer<Vec<u8>> for HttpSink {
    fn consume(&self, batch: Arc<Vec<u8>>) {
        let mut state = self.state.lock();
        state.buffer.push(&batch);

        // At most one chunk per store call; any surplus waits for the
        // next cycle.
        if let Some(chunk) = state.buffer.pop_chunk() {
            let name = chunk_file_name(&self.recorder_id, &self.session, state.index);
            state.index += 1;
            self.upload(name, chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_chunk_buffers_are_held_without_network_traffic() {
        // Nothing listens on this endpoint; as long as no full chunk
        // accumulates, no request is attempted.
        let sink = HttpSink::new("http://127.0.0.1:9/upload", "booth", 64);
        sink.consume(Arc::new(vec![0u8; 16]));
        sink.consume(Arc::new(vec![0u8; 16]));
        assert_eq!(sink.pending_bytes(), 32);
    }

    #[test]
    fn failed_upload_leaves_the_sink_usable() {
        // Port 9 (discard) refuses connections; the send fails, the call
        // returns, and subsequent stores keep accumulating.
        let sink = HttpSink::new("http://127.0.0.1:9/upload", "booth", 8);
        sink.consume(Arc::new(vec![0u8; 10]));
        assert_eq!(sink.pending_bytes(), 2);
        sink.consume(Arc::new(vec![0u8; 3]));
        assert_eq!(sink.pending_bytes(), 5);
    }
}
