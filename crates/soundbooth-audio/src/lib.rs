pub mod capture;
pub mod device;
pub mod frame;
pub mod headroom;
pub mod rms;

pub use capture::{CaptureMetrics, CaptureStats, Recorder};
pub use device::{AlsaCaptureDevice, CaptureConfig, CaptureDevice, SampleFormat};
pub use frame::{decode_frames, Frame, FrameBatch, RawBatch};
pub use headroom::{HeadroomAnalyzer, HeadroomReport};
pub use rms::{RmsAnalyzer, RmsReport};
