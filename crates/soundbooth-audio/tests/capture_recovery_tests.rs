//! Capture loop tests against a scripted device: fault recovery,
//! negotiation failure, and start/stop contract.

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use soundbooth_audio::{CaptureConfig, CaptureDevice, Recorder, SampleFormat};
use soundbooth_foundation::{AudioError, BatchConsumer, CaptureState, FanoutHub};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

enum Step {
    Data(Vec<u8>),
    Fault,
}

#[derive(Default)]
struct Counters {
    opens: AtomicU64,
    negotiations: AtomicU64,
    closes: AtomicU64,
}

struct ScriptedDevice {
    script: Mutex<VecDeque<Step>>,
    counters: Arc<Counters>,
    fail_negotiation: bool,
}

impl ScriptedDevice {
    fn new(steps: Vec<Step>, counters: Arc<Counters>) -> Box<Self> {
        Box::new(Self {
            script: Mutex::new(steps.into()),
            counters,
            fail_negotiation: false,
        })
    }
}

impl CaptureDevice for ScriptedDevice {
    fn open(&mut self) -> Result<(), AudioError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn negotiate(&mut self, _config: &CaptureConfig) -> Result<(), AudioError> {
        self.counters.negotiations.fetch_add(1, Ordering::SeqCst);
        if self.fail_negotiation {
            return Err(AudioError::Negotiation {
                param: "sample rate",
                requested: "48000".into(),
                confirmed: "44100".into(),
            });
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
        match self.script.lock().pop_front() {
            Some(Step::Data(bytes)) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len() / 4)
            }
            Some(Step::Fault) => Err(AudioError::Fault("overrun".into())),
            None => {
                // Script exhausted: behave like a silent device so the
                // loop can observe shutdown.
                std::thread::sleep(Duration::from_millis(5));
                Ok(0)
            }
        }
    }

    fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct Collect {
    tx: Sender<Arc<Vec<u8>>>,
}

impl BatchConsumer<Vec<u8>> for Collect {
    fn consume(&self, batch: Arc<Vec<u8>>) {
        let _ = self.tx.send(batch);
    }
}

fn test_config() -> CaptureConfig {
    CaptureConfig {
        sample_rate: 48_000,
        channels: 2,
        format: SampleFormat::S16Le,
        buffer_frames: 4,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn fault_triggers_renegotiation_and_capture_resumes() {
    let counters = Arc::new(Counters::default());
    let device = ScriptedDevice::new(
        vec![
            Step::Data((1..=16).collect()),
            Step::Fault,
            Step::Data((17..=32).collect()),
        ],
        counters.clone(),
    );

    let raw_hub = Arc::new(FanoutHub::new(tokio::runtime::Handle::current()));
    let (tx, rx) = unbounded();
    raw_hub.register(Arc::new(Collect { tx }));

    let mut recorder = Recorder::new(device, test_config()).with_raw_hub(raw_hub);
    recorder.start().unwrap();

    let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(*first, (1..=16).collect::<Vec<u8>>());
    assert_eq!(*second, (17..=32).collect::<Vec<u8>>());

    recorder.stop().unwrap();

    let stats = recorder.stats();
    assert_eq!(stats.xruns.load(Ordering::SeqCst), 1);
    assert_eq!(stats.recoveries.load(Ordering::SeqCst), 1);
    assert_eq!(stats.batches.load(Ordering::SeqCst), 2);
    // Initial setup plus one re-setup after the fault.
    assert_eq!(counters.negotiations.load(Ordering::SeqCst), 2);
    // Closed on the fault and again on shutdown.
    assert_eq!(counters.closes.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.state().current(), CaptureState::Stopped);
}

#[tokio::test(flavor = "multi_thread")]
async fn negotiation_mismatch_is_fatal() {
    let counters = Arc::new(Counters::default());
    let mut device = ScriptedDevice::new(vec![], counters.clone());
    device.fail_negotiation = true;

    let mut recorder = Recorder::new(device, test_config());
    recorder.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while recorder.is_running() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    assert!(!recorder.is_running());
    assert_eq!(recorder.state().current(), CaptureState::Stopped);
    // Exactly one attempt: mismatches are not retried.
    assert_eq!(counters.negotiations.load(Ordering::SeqCst), 1);
    // Device still closed on the fatal path.
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    assert!(matches!(recorder.stop(), Err(AudioError::NotRunning)));
}

#[tokio::test(flavor = "multi_thread")]
async fn double_start_and_double_stop_are_errors() {
    let counters = Arc::new(Counters::default());
    let device = ScriptedDevice::new(vec![], counters);

    let mut recorder = Recorder::new(device, test_config());
    recorder.start().unwrap();
    assert!(matches!(recorder.start(), Err(AudioError::AlreadyRunning)));

    recorder.stop().unwrap();
    assert!(matches!(recorder.stop(), Err(AudioError::NotRunning)));
}

#[tokio::test(flavor = "multi_thread")]
async fn frames_are_decoded_for_the_frame_hub() {
    use soundbooth_audio::{Frame, FrameBatch};

    struct CollectFrames {
        tx: Sender<Arc<FrameBatch>>,
    }

    impl BatchConsumer<FrameBatch> for CollectFrames {
        fn consume(&self, batch: Arc<FrameBatch>) {
            let _ = self.tx.send(batch);
        }
    }

    let counters = Arc::new(Counters::default());
    let device = ScriptedDevice::new(vec![Step::Data((1..=16).collect())], counters);

    let frame_hub = Arc::new(FanoutHub::new(tokio::runtime::Handle::current()));
    let (tx, rx) = unbounded();
    frame_hub.register(Arc::new(CollectFrames { tx }));

    let mut recorder = Recorder::new(device, test_config()).with_frame_hub(frame_hub);
    recorder.start().unwrap();

    let batch = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(
        batch[0],
        Frame {
            left: 0x0201,
            right: 0x0403
        }
    );
    assert_eq!(batch.len(), 4);

    recorder.stop().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn metrics_report_the_recorded_duration() {
    let counters = Arc::new(Counters::default());
    // Two cycles of 4 frames each at 48 kHz.
    let device = ScriptedDevice::new(
        vec![Step::Data(vec![0u8; 16]), Step::Data(vec![0u8; 16])],
        counters,
    );

    let (tx, rx) = unbounded();
    let mut recorder = Recorder::new(device, test_config()).with_metrics(tx);
    recorder.start().unwrap();

    let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    // Duration is quantized to whole nanoseconds.
    assert!((first.duration.as_secs_f64() - 4.0 / 48_000.0).abs() < 1e-8);
    assert!((second.duration.as_secs_f64() - 8.0 / 48_000.0).abs() < 1e-8);

    recorder.stop().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn recorder_can_restart_after_stop() {
    let counters = Arc::new(Counters::default());
    let device = ScriptedDevice::new(vec![], counters.clone());

    let mut recorder = Recorder::new(device, test_config());
    recorder.start().unwrap();
    recorder.stop().unwrap();

    recorder.start().unwrap();
    recorder.stop().unwrap();
    assert_eq!(counters.negotiations.load(Ordering::SeqCst), 2);
}
