use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("Transient error, will retry: {0}")]
    Transient(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Recorder is already running")]
    AlreadyRunning,

    #[error("Recorder is not running")]
    NotRunning,

    #[error("Device is not open")]
    DeviceClosed,

    #[error("Cannot negotiate {param}: requested {requested}, device confirmed {confirmed}")]
    Negotiation {
        param: &'static str,
        requested: String,
        confirmed: String,
    },

    #[error("Device error: {0}")]
    Device(String),

    #[error("Capture fault: {0}")]
    Fault(String),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

impl AudioError {
    /// Wrap a driver-level error that ends the current device session.
    pub fn device(err: impl std::fmt::Display) -> Self {
        AudioError::Device(err.to_string())
    }

    /// Wrap a transient read fault; the capture loop retries these.
    pub fn fault(err: impl std::fmt::Display) -> Self {
        AudioError::Fault(err.to_string())
    }
}
