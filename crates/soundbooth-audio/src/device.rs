use alsa::pcm::{Access, Format, Frames, HwParams, PCM};
use alsa::{Direction, ValueOr};
use soundbooth_foundation::AudioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S16Le,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
        }
    }
}

/// Requested device parameters. Setup fails unless the device confirms
/// every value exactly; the struct is immutable after construction.
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u32,
    pub format: SampleFormat,
    pub buffer_frames: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            format: SampleFormat::S16Le,
            buffer_frames: 1024,
        }
    }
}

impl CaptureConfig {
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }

    pub fn buffer_bytes(&self) -> usize {
        self.buffer_frames * self.bytes_per_frame()
    }
}

/// The hardware capture boundary. The capture loop owns exactly one
/// device and drives it through this seam, which also keeps the loop
/// testable against scripted devices.
pub trait CaptureDevice: Send {
    fn open(&mut self) -> Result<(), AudioError>;

    /// Negotiate the exact requested parameters; a confirmed value that
    /// differs from the request is a negotiation error, never retried.
    fn negotiate(&mut self, config: &CaptureConfig) -> Result<(), AudioError>;

    /// Blocking read of one buffer. Returns frames read; an
    /// `AudioError::Fault` is a transient device fault (e.g. overrun)
    /// that the capture loop recovers from by re-setup.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError>;

    fn close(&mut self);
}

/// ALSA PCM capture device.
pub struct AlsaCaptureDevice {
    name: String,
    pcm: Option<PCM>,
}

impl AlsaCaptureDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pcm: None,
        }
    }

    fn pcm(&self) -> Result<&PCM, AudioError> {
        self.pcm.as_ref().ok_or(AudioError::DeviceClosed)
    }
}

fn confirm<T: PartialEq + std::fmt::Debug>(
    param: &'static str,
    requested: T,
    confirmed: T,
) -> Result<(), AudioError> {
    if requested != confirmed {
        return Err(AudioError::Negotiation {
            param,
            requested: format!("{:?}", requested),
            confirmed: format!("{:?}", confirmed),
        });
    }
    Ok(())
}

impl CaptureDevice for AlsaCaptureDevice {
    fn open(&mut self) -> Result<(), AudioError> {
        if self.pcm.is_some() {
            return Ok(());
        }
        let pcm = PCM::new(&self.name, Direction::Capture, false)
            .map_err(AudioError::device)?;
        self.pcm = Some(pcm);
        Ok(())
    }

    fn negotiate(&mut self, config: &CaptureConfig) -> Result<(), AudioError> {
        let pcm = self.pcm()?;
        let format = match config.format {
            SampleFormat::S16Le => Format::S16LE,
        };

        let hwp = HwParams::any(pcm).map_err(AudioError::device)?;
        hwp.set_access(Access::RWInterleaved)
            .map_err(AudioError::device)?;
        hwp.set_channels(config.channels)
            .map_err(AudioError::device)?;
        hwp.set_rate(config.sample_rate, ValueOr::Nearest)
            .map_err(AudioError::device)?;
        hwp.set_format(format).map_err(AudioError::device)?;
        hwp.set_buffer_size(config.buffer_frames as Frames)
            .map_err(AudioError::device)?;
        pcm.hw_params(&hwp).map_err(AudioError::device)?;

        confirm(
            "channels",
            config.channels,
            hwp.get_channels().map_err(AudioError::device)?,
        )?;
        confirm(
            "sample rate",
            config.sample_rate,
            hwp.get_rate().map_err(AudioError::device)?,
        )?;
        confirm(
            "sample format",
            format,
            hwp.get_format().map_err(AudioError::device)?,
        )?;
        confirm(
            "buffer size",
            config.buffer_frames as Frames,
            hwp.get_buffer_size().map_err(AudioError::device)?,
        )?;

        pcm.prepare().map_err(AudioError::device)?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
        let pcm = self.pcm()?;
        let io = pcm.io_bytes();
        io.readi(buf).map_err(AudioError::fault)
    }

    fn close(&mut self) {
        if let Some(pcm) = self.pcm.take() {
            drop(pcm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_bytes_for_stereo_s16() {
        let cfg = CaptureConfig::default();
        assert_eq!(cfg.bytes_per_frame(), 4);
        assert_eq!(cfg.buffer_bytes(), 4096);
    }

    #[test]
    fn confirm_rejects_mismatch() {
        assert!(confirm("sample rate", 48_000u32, 44_100u32).is_err());
        assert!(confirm("channels", 2u32, 2u32).is_ok());
    }

    #[test]
    fn read_on_closed_device_is_an_error() {
        let mut dev = AlsaCaptureDevice::new("default");
        let mut buf = [0u8; 16];
        assert!(matches!(
            dev.read(&mut buf),
            Err(AudioError::DeviceClosed)
        ));
    }
}
