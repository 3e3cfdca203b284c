use parking_lot::Mutex;
use std::time::Duration;

/// Consumer-facing setters for an attached status display. The core only
/// pushes scalar updates through this seam; rendering (framebuffer, QR
/// codes) lives outside this repository.
pub trait StatusScreen: Send + Sync {
    /// Current level as a 0..1 fraction.
    fn set_level(&self, level: f32);
    fn set_title(&self, title: &str);
    fn set_duration(&self, elapsed: Duration);
}

/// Log-backed status screen used when no display hardware is attached.
/// Duration updates are throttled to whole seconds.
#[derive(Default)]
pub struct LogStatusScreen {
    last_whole_secs: Mutex<Option<u64>>,
}

impl StatusScreen for LogStatusScreen {
    fn set_level(&self, level: f32) {
        tracing::trace!(level = f64::from(level), "status level");
    }

    fn set_title(&self, title: &str) {
        tracing::info!(title, "status title");
    }

    fn set_duration(&self, elapsed: Duration) {
        let secs = elapsed.as_secs();
        let mut last = self.last_whole_secs.lock();
        if *last != Some(secs) {
            *last = Some(secs);
            tracing::debug!(secs, "recorded duration");
        }
    }
}
