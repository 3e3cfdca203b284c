use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;

/// A consumer of published batches. Invocations for successive batches may
/// overlap in time; implementations that keep state must serialize it
/// internally.
pub trait BatchConsumer<T>: Send + Sync {
    fn consume(&self, batch: Arc<T>);
}

/// Fan-out dispatcher: every published batch is handed to each registered
/// consumer on its own blocking task. Dispatch never waits for a consumer
/// to finish, so a slow sink cannot stall the capture loop. There is no
/// back-pressure.
pub struct FanoutHub<T> {
    consumers: Mutex<Vec<Arc<dyn BatchConsumer<T>>>>,
    handle: Handle,
}

impl<T: Send + Sync + 'static> FanoutHub<T> {
    pub fn new(handle: Handle) -> Self {
        Self {
            consumers: Mutex::new(Vec::new()),
            handle,
        }
    }

    /// Registration takes effect with the next published batch.
    pub fn register(&self, consumer: Arc<dyn BatchConsumer<T>>) {
        self.consumers.lock().push(consumer);
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().len()
    }

    /// Snapshot the consumer list, then dispatch. The lock is never held
    /// across consumer invocations.
    pub fn publish(&self, batch: Arc<T>) {
        let snapshot: Vec<_> = self.consumers.lock().clone();
        for consumer in snapshot {
            let batch = Arc::clone(&batch);
            self.handle.spawn_blocking(move || consumer.consume(batch));
        }
    }
}
