use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Cannot open bus device {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Bus device is not open")]
    NotOpen,

    #[error("Cannot select device address {addr:#04x}: {source}")]
    AddressSelect { addr: u8, source: std::io::Error },

    #[error("Bus transfer failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Short read: expected {expected} bytes, transferred {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Short write: expected {expected} bytes, transferred {actual}")]
    ShortWrite { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum HalError {
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Level {level} out of range for {segments}-segment bar")]
    LevelOutOfRange { level: usize, segments: usize },

    #[error("No output mapping for bar segment {index}")]
    MissingMapping { index: usize },

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}
