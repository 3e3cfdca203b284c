mod levels;
mod status;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::unbounded;
use soundbooth_audio::{
    AlsaCaptureDevice, CaptureConfig, CaptureMetrics, FrameBatch, HeadroomAnalyzer, RawBatch,
    Recorder, RmsAnalyzer, SampleFormat,
};
use soundbooth_foundation::{CaptureState, FanoutHub};
use soundbooth_hal::{
    BarMode, ByteBus, GpioController, I2c, Indicator, LevelBar, Pcf8574, PinMapping,
};
use soundbooth_storage::{ChunkFileSink, FifoSink, HttpSink};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

use levels::{db_to_fraction, db_to_led_level};
use status::{LogStatusScreen, StatusScreen};

#[derive(Parser, Debug)]
#[command(name = "soundbooth", about = "Unattended stereo audio-recording appliance")]
struct Args {
    /// ALSA capture device name
    #[arg(long, env = "SOUNDBOOTH_DEVICE", default_value = "default")]
    device: String,

    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,

    /// Capture buffer size in frames
    #[arg(long, default_value_t = 1024)]
    buffer_frames: usize,

    /// Recorder identity carried in chunk file names
    #[arg(long, env = "SOUNDBOOTH_ID", default_value = "soundbooth")]
    recorder_id: String,

    /// Named pipe for the live passthrough sink
    #[arg(long)]
    fifo_path: Option<PathBuf>,

    /// Directory for the session-chunked file writer
    #[arg(long)]
    chunk_dir: Option<PathBuf>,

    /// Endpoint for the chunked HTTP uploader
    #[arg(long)]
    upload_url: Option<String>,

    /// Chunk size in bytes for the file and HTTP sinks
    #[arg(long, default_value_t = 256 * 1024)]
    chunk_size: usize,

    /// I2C bus number carrying the LED expanders; omit to run headless
    #[arg(long)]
    i2c_bus: Option<u8>,
}

/// Ten-segment bar wired across two expanders, high pins first.
fn bar_mappings(
    low: &Arc<dyn GpioController>,
    high: &Arc<dyn GpioController>,
) -> HashMap<usize, PinMapping> {
    let mut mappings = HashMap::new();
    for i in 0..8 {
        mappings.insert(
            i,
            PinMapping {
                controller: Arc::clone(low),
                pin: 7 - i,
                invert: false,
            },
        );
    }
    for (i, pin) in [(8, 7), (9, 6)] {
        mappings.insert(
            i,
            PinMapping {
                controller: Arc::clone(high),
                pin,
                invert: false,
            },
        );
    }
    mappings
}

fn drive_bar(bar: &LevelBar, db: f64) {
    let result = match db_to_led_level(db, bar.segment_count()) {
        Some(level) => bar.set(level),
        None => bar.clear(),
    };
    if let Err(e) = result {
        tracing::warn!("Cannot drive level bar: {}", e);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Cannot build runtime")?;

    let (shutdown_tx, shutdown_rx) = unbounded::<String>();

    // Storage path: raw bytes fan out to every configured sink.
    let raw_hub = Arc::new(FanoutHub::<RawBatch>::new(runtime.handle().clone()));
    if let Some(path) = &args.fifo_path {
        raw_hub.register(Arc::new(FifoSink::new(path)));
    }
    if let Some(dir) = &args.chunk_dir {
        let (failure_tx, failure_rx) = unbounded();
        let sink = ChunkFileSink::new(dir, &args.recorder_id, args.chunk_size)
            .context("Cannot create chunk storage")?
            .with_failure_channel(failure_tx);
        raw_hub.register(Arc::new(sink));

        // Losing recorded audio is fatal; the supervisor decides, not
        // the sink.
        let shutdown_tx = shutdown_tx.clone();
        thread::spawn(move || {
            if let Ok(e) = failure_rx.recv() {
                tracing::error!("Storage failure: {}", e);
                let _ = shutdown_tx.send("storage failure".into());
            }
        });
    }
    if let Some(url) = &args.upload_url {
        raw_hub.register(Arc::new(HttpSink::new(
            url,
            &args.recorder_id,
            args.chunk_size,
        )));
    }

    // Analysis path: decoded frames fan out to the analyzers.
    let frame_hub = Arc::new(FanoutHub::<FrameBatch>::new(runtime.handle().clone()));
    let (rms_tx, rms_rx) = unbounded();
    frame_hub.register(Arc::new(RmsAnalyzer::new(Some(rms_tx))));
    let (headroom_tx, headroom_rx) = unbounded();
    frame_hub.register(Arc::new(HeadroomAnalyzer::new(Some(headroom_tx))));

    let status: Arc<dyn StatusScreen> = Arc::new(LogStatusScreen::default());
    status.set_title("recording");

    // Indicator hardware, when an I2C bus is attached.
    let (mut bars, mut clipping_led) = (None, None);
    if let Some(bus_number) = args.i2c_bus {
        let bus: Arc<dyn ByteBus> = Arc::new(I2c::open(bus_number));
        let left_low: Arc<dyn GpioController> = Arc::new(Pcf8574::new(Arc::clone(&bus), 0x21));
        let left_high: Arc<dyn GpioController> = Arc::new(Pcf8574::new(Arc::clone(&bus), 0x20));
        let right_low: Arc<dyn GpioController> = Arc::new(Pcf8574::new(Arc::clone(&bus), 0x22));
        let right_high: Arc<dyn GpioController> = Arc::new(Pcf8574::new(Arc::clone(&bus), 0x23));

        bars = Some((
            LevelBar::new(bar_mappings(&left_low, &left_high), BarMode::Bar),
            LevelBar::new(bar_mappings(&right_low, &right_high), BarMode::Bar),
        ));
        clipping_led = Some(Indicator::new(PinMapping {
            controller: left_high,
            pin: 0,
            invert: true,
        }));
    }

    // Level meters and status screen follow the RMS reports.
    {
        let status = Arc::clone(&status);
        thread::spawn(move || {
            for report in rms_rx {
                if let Some((left_bar, right_bar)) = &bars {
                    drive_bar(left_bar, report.db_left);
                    drive_bar(right_bar, report.db_right);
                }
                status.set_level(db_to_fraction(report.db_right));
            }
        });
    }

    // The clipping LED lights for every cycle that clipped.
    thread::spawn(move || {
        let mut last_count = 0u64;
        for report in headroom_rx {
            if let Some(led) = &clipping_led {
                led.set(report.clipping_cycles > last_count);
            }
            last_count = report.clipping_cycles;
        }
    });

    // Recorded duration feeds the status screen.
    let (metrics_tx, metrics_rx) = unbounded::<CaptureMetrics>();
    {
        let status = Arc::clone(&status);
        thread::spawn(move || {
            for metrics in metrics_rx {
                status.set_duration(metrics.duration);
            }
        });
    }

    let config = CaptureConfig {
        sample_rate: args.sample_rate,
        channels: 2,
        format: SampleFormat::S16Le,
        buffer_frames: args.buffer_frames,
    };
    let device = AlsaCaptureDevice::new(&args.device);
    let mut recorder = Recorder::new(Box::new(device), config)
        .with_raw_hub(Arc::clone(&raw_hub))
        .with_frame_hub(Arc::clone(&frame_hub))
        .with_metrics(metrics_tx);

    // A capture loop that stops on its own (negotiation failure) takes
    // the process down with it.
    {
        let state_rx = recorder.state().subscribe();
        let shutdown_tx = shutdown_tx.clone();
        thread::spawn(move || {
            for state in state_rx {
                if state == CaptureState::Stopped {
                    let _ = shutdown_tx.send("capture stopped".into());
                    break;
                }
            }
        });
    }

    recorder.start().context("Cannot start recorder")?;
    tracing::info!(device = %args.device, "Recording");

    {
        let shutdown_tx = shutdown_tx.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send("interrupt".into());
            }
        });
    }

    let reason = shutdown_rx
        .recv()
        .unwrap_or_else(|_| "shutdown channel closed".into());
    tracing::info!(%reason, "Shutting down");

    if let Err(e) = recorder.stop() {
        tracing::warn!("Recorder did not stop cleanly: {}", e);
    }
    Ok(())
}
