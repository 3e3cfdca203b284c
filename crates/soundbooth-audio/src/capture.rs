use crossbeam_channel::Sender;
use parking_lot::Mutex;
use soundbooth_foundation::{AudioError, CaptureState, FanoutHub, StateMachine};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::{CaptureConfig, CaptureDevice};
use crate::frame::{decode_frames, FrameBatch, RawBatch};

/// Per-cycle bookkeeping for the status screen.
#[derive(Debug, Clone, Copy)]
pub struct CaptureMetrics {
    /// Total recorded time of the current run, derived from frames read.
    pub duration: Duration,
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub batches: AtomicU64,
    pub xruns: AtomicU64,
    pub recoveries: AtomicU64,
}

/// Owns the capture device and its buffer. While running it reads one
/// fixed-size buffer per cycle and publishes the raw bytes and the
/// decoded frames to their hubs. Transient device faults are recovered
/// by closing and re-negotiating the device, indefinitely; only a
/// negotiation mismatch ends the loop.
pub struct Recorder {
    device: Arc<Mutex<Option<Box<dyn CaptureDevice>>>>,
    config: CaptureConfig,
    raw_hub: Option<Arc<FanoutHub<RawBatch>>>,
    frame_hub: Option<Arc<FanoutHub<FrameBatch>>>,
    metrics_tx: Option<Sender<CaptureMetrics>>,
    state: Arc<StateMachine>,
    stats: Arc<CaptureStats>,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Recorder {
    pub fn new(device: Box<dyn CaptureDevice>, config: CaptureConfig) -> Self {
        Self {
            device: Arc::new(Mutex::new(Some(device))),
            config,
            raw_hub: None,
            frame_hub: None,
            metrics_tx: None,
            state: Arc::new(StateMachine::new()),
            stats: Arc::new(CaptureStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn with_raw_hub(mut self, hub: Arc<FanoutHub<RawBatch>>) -> Self {
        self.raw_hub = Some(hub);
        self
    }

    pub fn with_frame_hub(mut self, hub: Arc<FanoutHub<FrameBatch>>) -> Self {
        self.frame_hub = Some(hub);
        self
    }

    pub fn with_metrics(mut self, tx: Sender<CaptureMetrics>) -> Self {
        self.metrics_tx = Some(tx);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> Arc<StateMachine> {
        Arc::clone(&self.state)
    }

    /// Begin continuous capture on a dedicated thread.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }

        if self.device.lock().is_none() {
            self.running.store(false, Ordering::SeqCst);
            return Err(AudioError::Fatal("capture device is missing".into()));
        }

        self.shutdown.store(false, Ordering::SeqCst);
        let worker = CaptureWorker {
            device_slot: Arc::clone(&self.device),
            config: self.config,
            raw_hub: self.raw_hub.clone(),
            frame_hub: self.frame_hub.clone(),
            metrics_tx: self.metrics_tx.clone(),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            running: Arc::clone(&self.running),
            shutdown: Arc::clone(&self.shutdown),
        };

        match thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                // The worker never took the device; unlatch so a later
                // start can succeed.
                self.running.store(false, Ordering::SeqCst);
                Err(AudioError::Fatal(format!(
                    "Cannot spawn capture thread: {}",
                    e
                )))
            }
        }
    }

    /// Request graceful shutdown, observed at the next cycle boundary.
    /// An in-flight blocking read is not interrupted.
    pub fn stop(&mut self) -> Result<(), AudioError> {
        let was_running = self.running.load(Ordering::SeqCst);
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if !was_running {
            return Err(AudioError::NotRunning);
        }
        Ok(())
    }
}

struct CaptureWorker {
    device_slot: Arc<Mutex<Option<Box<dyn CaptureDevice>>>>,
    config: CaptureConfig,
    raw_hub: Option<Arc<FanoutHub<RawBatch>>>,
    frame_hub: Option<Arc<FanoutHub<FrameBatch>>>,
    metrics_tx: Option<Sender<CaptureMetrics>>,
    state: Arc<StateMachine>,
    stats: Arc<CaptureStats>,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl CaptureWorker {
    fn run(self) {
        tracing::info!(
            rate = self.config.sample_rate,
            channels = self.config.channels,
            frames = self.config.buffer_frames,
            "Capture loop starting"
        );

        let Some(mut device) = self.device_slot.lock().take() else {
            self.running.store(false, Ordering::SeqCst);
            return;
        };

        let mut buf = vec![0u8; self.config.buffer_bytes()];
        let bytes_per_frame = self.config.bytes_per_frame();
        let mut frames_total: u64 = 0;

        let _ = self.state.transition(CaptureState::Negotiating);
        'session: loop {
            if self.shutdown.load(Ordering::SeqCst) {
                let _ = self.state.transition(CaptureState::Stopped);
                break;
            }

            if let Err(e) = Self::setup(&mut device, &self.config) {
                tracing::error!("Cannot set up capture device: {}", e);
                let _ = self.state.transition(CaptureState::Stopped);
                break;
            }
            let _ = self.state.transition(CaptureState::Capturing);

            loop {
                if self.shutdown.load(Ordering::SeqCst) {
                    let _ = self.state.transition(CaptureState::Stopped);
                    break 'session;
                }

                let frames = match device.read(&mut buf) {
                    Ok(frames) => frames,
                    Err(e) => {
                        let xruns = self.stats.xruns.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::warn!(xruns, "Capture fault, re-opening device: {}", e);
                        device.close();
                        let _ = self.state.transition(CaptureState::Recovering {
                            reason: e.to_string(),
                        });
                        self.stats.recoveries.fetch_add(1, Ordering::Relaxed);
                        let _ = self.state.transition(CaptureState::Negotiating);
                        continue 'session;
                    }
                };

                if frames == 0 {
                    continue;
                }

                let len = (frames * bytes_per_frame).min(buf.len());
                let data = &buf[..len];

                if let Some(hub) = &self.raw_hub {
                    hub.publish(Arc::new(data.to_vec()));
                }
                if let Some(hub) = &self.frame_hub {
                    hub.publish(Arc::new(decode_frames(data)));
                }

                self.stats.batches.fetch_add(1, Ordering::Relaxed);
                frames_total += frames as u64;
                if let Some(tx) = &self.metrics_tx {
                    let secs = frames_total as f64 / self.config.sample_rate as f64;
                    let _ = tx.send(CaptureMetrics {
                        duration: Duration::from_secs_f64(secs),
                    });
                }
            }
        }

        // The device is closed on every exit path, shutdown and fatal
        // setup failure alike, then handed back for a later restart.
        device.close();
        *self.device_slot.lock() = Some(device);
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Capture loop stopped");
    }

    fn setup(device: &mut Box<dyn CaptureDevice>, config: &CaptureConfig) -> Result<(), AudioError> {
        device.open()?;
        device.negotiate(config)
    }
}
