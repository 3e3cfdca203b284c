use crate::error::BusError;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

/// ioctl request to latch the slave address for subsequent transfers.
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// Byte-level register access to a shared serial bus. All expander
/// controllers on one bus must route through the same instance.
pub trait ByteBus: Send + Sync {
    fn read_byte(&self, addr: u8) -> Result<u8, BusError>;
    fn write_byte(&self, addr: u8, value: u8) -> Result<(), BusError>;
}

/// Raw transport behind the bus driver. The trait seam exists so the
/// address-latch behavior can be exercised without hardware.
pub trait I2cTransport: Send {
    /// Idempotent; called before every transfer.
    fn open(&mut self) -> Result<(), BusError>;
    fn select(&mut self, addr: u8) -> Result<(), BusError>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError>;
    fn write(&mut self, buf: &[u8]) -> Result<usize, BusError>;
}

/// `/dev/i2c-N` transport: lazy open, ioctl address select.
pub struct DevI2c {
    path: PathBuf,
    file: Option<File>,
}

impl DevI2c {
    pub fn new(bus_number: u8) -> Self {
        Self {
            path: PathBuf::from(format!("/dev/i2c-{}", bus_number)),
            file: None,
        }
    }

    fn file(&mut self) -> Result<&mut File, BusError> {
        self.file.as_mut().ok_or(BusError::NotOpen)
    }
}

impl I2cTransport for DevI2c {
    fn open(&mut self) -> Result<(), BusError> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|source| BusError::Open {
                path: self.path.clone(),
                source,
            })?;
        self.file = Some(file);
        Ok(())
    }

    fn select(&mut self, addr: u8) -> Result<(), BusError> {
        let fd = self.file()?.as_raw_fd();
        // SAFETY: fd is a valid open descriptor; I2C_SLAVE takes a plain
        // integer argument.
        let rc = unsafe { libc::ioctl(fd, I2C_SLAVE as _, libc::c_ulong::from(addr)) };
        if rc < 0 {
            return Err(BusError::AddressSelect {
                addr,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BusError> {
        Ok(self.file()?.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, BusError> {
        Ok(self.file()?.write(buf)?)
    }
}

struct BusState<T> {
    transport: T,
    latched_addr: Option<u8>,
}

/// Serializes all transfers on one bus under a single lock and skips the
/// address-select operation when consecutive transfers target the same
/// device.
pub struct I2cBus<T: I2cTransport> {
    state: Mutex<BusState<T>>,
}

/// The production bus driver.
pub type I2c = I2cBus<DevI2c>;

impl I2c {
    pub fn open(bus_number: u8) -> Self {
        I2cBus::with_transport(DevI2c::new(bus_number))
    }
}

impl<T: I2cTransport> I2cBus<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            state: Mutex::new(BusState {
                transport,
                latched_addr: None,
            }),
        }
    }

    fn prepare(state: &mut BusState<T>, addr: u8) -> Result<(), BusError> {
        state.transport.open()?;
        if state.latched_addr != Some(addr) {
            state.transport.select(addr)?;
            state.latched_addr = Some(addr);
        }
        Ok(())
    }
}

impl<T: I2cTransport> ByteBus for I2cBus<T> {
    fn read_byte(&self, addr: u8) -> Result<u8, BusError> {
        let mut state = self.state.lock();
        Self::prepare(&mut state, addr)?;

        let mut byte = [0u8; 1];
        let n = state.transport.read(&mut byte)?;
        if n != 1 {
            return Err(BusError::ShortRead {
                expected: 1,
                actual: n,
            });
        }
        Ok(byte[0])
    }

    fn write_byte(&self, addr: u8, value: u8) -> Result<(), BusError> {
        let mut state = self.state.lock();
        Self::prepare(&mut state, addr)?;

        let n = state.transport.write(&[value])?;
        if n != 1 {
            return Err(BusError::ShortWrite {
                expected: 1,
                actual: n,
            });
        }
        Ok(())
    }
}
