//! GPIO control via the Linux character-device interface.

use std::path::Path;

use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use log::error;

use crate::error::{Error, Result};

/// Consumer label reported for requested lines in `gpioinfo` output.
pub const GPIO_CONSUMER: &str = "bgt60trxx";

/// Opens a GPIO chip device such as `/dev/gpiochip0`.
pub fn open_chip<P: AsRef<Path>>(path: P) -> Result<Chip> {
    let path = path.as_ref();
    Chip::new(path).map_err(|e| {
        error!("Failed to open GPIO chip {}: {}", path.display(), e);
        Error::Gpio(e)
    })
}

/// A single GPIO line requested as output.
///
/// The kernel hands out one descriptor per requested line, independent of
/// the chip descriptor; dropping the handle releases the line.
pub struct OutputLine {
    handle: LineHandle,
}

impl OutputLine {
    /// Requests `offset` on `chip` as an output line driven to `initial`.
    pub fn request(chip: &mut Chip, offset: u32, initial: bool) -> Result<Self> {
        let handle = chip
            .get_line(offset)?
            .request(LineRequestFlags::OUTPUT, initial as u8, GPIO_CONSUMER)
            .map_err(|e| {
                error!("Failed to request GPIO line {}: {}", offset, e);
                Error::Gpio(e)
            })?;
        Ok(Self { handle })
    }

    /// Drives the line high or low. Every call is a fresh ioctl; nothing
    /// is cached and no read-back verification happens.
    pub fn set(&self, value: bool) -> Result<()> {
        self.handle.set_value(value as u8).map_err(Error::Gpio)
    }
}
