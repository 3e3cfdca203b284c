pub mod error;
pub mod expander;
pub mod i2c;
pub mod indicator;

pub use error::{BusError, HalError};
pub use expander::{GpioController, Pcf8574, PIN_COUNT};
pub use i2c::{ByteBus, DevI2c, I2c, I2cBus, I2cTransport};
pub use indicator::{BarMode, Indicator, LevelBar, PinMapping};
