use crate::error::HalError;
use crate::i2c::ByteBus;
use parking_lot::Mutex;
use std::sync::Arc;

pub const PIN_COUNT: usize = 8;

/// Capability surface of an addressable digital-output device. Input pins
/// are declared but not implemented on the expanders we ship; the input
/// paths return `HalError::NotImplemented` instead of terminating.
pub trait GpioController: Send + Sync {
    fn pin_count(&self) -> usize;
    fn get(&self, pin: usize) -> Result<bool, HalError>;
    fn set(&self, pin: usize, on: bool);
    fn is_input(&self, pin: usize) -> bool;
    fn set_input(&self, pin: usize, input: bool) -> Result<(), HalError>;
}

#[derive(Default)]
struct PinMasks {
    value: u8,
    input: u8,
}

/// PCF8574-class 8-bit expander: one quasi-bidirectional register, no
/// partial writes. Every pin change rewrites the full value mask.
pub struct Pcf8574 {
    bus: Arc<dyn ByteBus>,
    address: u8,
    masks: Mutex<PinMasks>,
}

impl Pcf8574 {
    pub fn new(bus: Arc<dyn ByteBus>, address: u8) -> Self {
        Self {
            bus,
            address,
            masks: Mutex::new(PinMasks::default()),
        }
    }

    /// Write the mirrored value mask out to the device. Bus errors leave
    /// the controller degraded but running.
    fn sync(&self, mask: u8) {
        if let Err(e) = self.bus.write_byte(self.address, mask) {
            tracing::error!(addr = self.address, "Cannot sync expander: {}", e);
        }
    }
}

impl GpioController for Pcf8574 {
    fn pin_count(&self) -> usize {
        PIN_COUNT
    }

    fn get(&self, pin: usize) -> Result<bool, HalError> {
        if pin >= PIN_COUNT {
            tracing::warn!(pin, "Pin out of range for expander");
            return Ok(false);
        }

        let masks = self.masks.lock();
        if masks.input & (1 << pin) != 0 {
            return Err(HalError::NotImplemented("expander input pins"));
        }
        Ok(masks.value & (1 << pin) != 0)
    }

    fn set(&self, pin: usize, on: bool) {
        if pin >= PIN_COUNT {
            tracing::warn!(pin, "Pin out of range for expander");
            return;
        }

        let mut masks = self.masks.lock();
        if on {
            masks.value |= 1 << pin;
        } else {
            masks.value &= !(1 << pin);
        }
        self.sync(masks.value);
    }

    fn is_input(&self, pin: usize) -> bool {
        if pin >= PIN_COUNT {
            tracing::warn!(pin, "Pin out of range for expander");
            return false;
        }
        self.masks.lock().input & (1 << pin) != 0
    }

    fn set_input(&self, pin: usize, input: bool) -> Result<(), HalError> {
        if pin >= PIN_COUNT {
            tracing::warn!(pin, "Pin out of range for expander");
            return Ok(());
        }
        if !input {
            return Ok(());
        }
        Err(HalError::NotImplemented("expander input pins"))
    }
}
