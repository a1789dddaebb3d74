//! Linux userspace driver for the XENSIV BGT60TRxx family of 60 GHz FMCW
//! radar sensors.
//!
//! Hardware access goes through the standard Linux kernel interfaces: the
//! `spidev` character device for SPI and the GPIO character device for the
//! reset and software chip-select lines. [`PlatformHandle`] owns the four
//! descriptors involved; [`Bgt60trxx`] is the register protocol engine on
//! top of it; [`FrameStream`] drains the sensor FIFO into frames on a
//! background thread.
//!
//! ```no_run
//! use bgt60trxx_linux::{Bgt60trxx, PlatformHandle};
//!
//! # fn main() -> bgt60trxx_linux::Result<()> {
//! let iface = PlatformHandle::open("/dev/spidev0.0", "/dev/gpiochip0", 18, 24)?;
//! let mut radar = Bgt60trxx::new(iface, false)?;
//! println!("{} with {} FIFO samples", radar.device(), radar.fifo_size());
//! radar.close();
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod error;
pub mod gpio;
pub mod platform;
pub mod regs;
pub mod spi;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use device::{Bgt60trxx, DeviceType, FifoStatus, Reset};
pub use error::{
    Error, Result, STATUS_COM_ERROR, STATUS_DEV_ERROR, STATUS_GSR0_ERROR, STATUS_OK,
    STATUS_TIMEOUT_ERROR,
};
pub use platform::{fatal_assert, word_reverse, Platform, PlatformHandle};
pub use stream::{FrameAssembler, FrameStream, StreamConfig};
