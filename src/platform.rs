//! Platform binding: owns the OS descriptors for one sensor and exposes
//! the operation set the protocol engine is written against.

use std::path::Path;
use std::process;
use std::thread;
use std::time::Duration;

use gpio_cdev::Chip;
use log::{debug, error, warn};

use crate::error::{Error, Result};
use crate::gpio::{self, OutputLine};
use crate::spi::SpiBus;

/// The operations the protocol engine needs from the host.
///
/// [`PlatformHandle`] is the Linux implementation; tests substitute a
/// scripted mock.
pub trait Platform {
    /// Drives the sensor reset pin. Silently no-ops when the line is unset.
    fn rst_set(&mut self, high: bool);

    /// Drives the software chip-select pin. Silently no-ops when the line
    /// is unset.
    fn cs_set(&mut self, high: bool);

    /// One blocking full-duplex SPI exchange.
    fn spi_transfer(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()>;

    /// Blocking FIFO burst read of `sample_count` 16-bit samples.
    fn spi_fifo_read(&mut self, rx: &mut [u8], sample_count: usize) -> Result<()>;

    /// Blocking millisecond delay.
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Reverses the byte order of a register word, independent of host
/// endianness: `0x12345678` becomes `0x78563412` everywhere.
pub fn word_reverse(x: u32) -> u32 {
    x.swap_bytes()
}

/// Fatal-assertion hook for invariants the protocol engine considers
/// unrecoverable. Logs and terminates; execution never continues past a
/// failed assertion.
pub fn fatal_assert(cond: bool, what: &str) {
    if !cond {
        error!("BGT60TRxx fatal assertion failed: {}", what);
        process::abort();
    }
}

/// The four descriptor slots backing one sensor.
///
/// Each slot is either open or `None` (unset). The handle is exclusively
/// owned; nothing here is safe to share between threads without external
/// serialization.
#[derive(Default)]
pub struct PlatformHandle {
    spi: Option<SpiBus>,
    gpio_chip: Option<Chip>,
    rst_line: Option<OutputLine>,
    cs_line: Option<OutputLine>,
}

impl PlatformHandle {
    /// Acquires all four descriptors in fixed order: SPI device (open and
    /// configure), GPIO chip, reset line, chip-select line. Both lines come
    /// up driven high.
    ///
    /// On any failure everything acquired so far is released, in reverse
    /// order, before the error is returned; a partially-open handle never
    /// escapes.
    pub fn open<S, G>(spi_path: S, gpio_path: G, rst_offset: u32, cs_offset: u32) -> Result<Self>
    where
        S: AsRef<Path>,
        G: AsRef<Path>,
    {
        // Early returns drop the locals below in reverse declaration
        // order, which closes the descriptors opened so far.
        let spi = SpiBus::open(spi_path)?;
        let mut chip = gpio::open_chip(gpio_path)?;
        let rst_line = OutputLine::request(&mut chip, rst_offset, true)?;
        let cs_line = OutputLine::request(&mut chip, cs_offset, true)?;

        debug!(
            "Platform handle open (rst offset {}, cs offset {})",
            rst_offset, cs_offset
        );
        Ok(Self {
            spi: Some(spi),
            gpio_chip: Some(chip),
            rst_line: Some(rst_line),
            cs_line: Some(cs_line),
        })
    }

    /// True while the SPI slot is open.
    pub fn is_open(&self) -> bool {
        self.spi.is_some()
    }

    /// Releases every open descriptor in reverse acquisition order and
    /// leaves all slots unset. Calling this on an already-closed handle is
    /// a no-op, so repeated teardown is safe.
    pub fn close(&mut self) {
        drop(self.cs_line.take());
        drop(self.rst_line.take());
        drop(self.gpio_chip.take());
        drop(self.spi.take());
    }
}

impl Drop for PlatformHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl Platform for PlatformHandle {
    fn rst_set(&mut self, high: bool) {
        // Permissive by contract: callers toggle pins during partial
        // teardown, so an unset slot is not an observable error.
        if let Some(line) = &self.rst_line {
            if let Err(e) = line.set(high) {
                warn!("Failed to set RST line: {}", e);
            }
        }
    }

    fn cs_set(&mut self, high: bool) {
        if let Some(line) = &self.cs_line {
            if let Err(e) = line.set(high) {
                warn!("Failed to set CS line: {}", e);
            }
        }
    }

    fn spi_transfer(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()> {
        match self.spi.as_mut() {
            Some(spi) => spi.transfer(tx, rx),
            None => Err(Error::Invalid("SPI device not open")),
        }
    }

    fn spi_fifo_read(&mut self, rx: &mut [u8], sample_count: usize) -> Result<()> {
        match self.spi.as_mut() {
            Some(spi) => spi.fifo_read(rx, sample_count),
            None => Err(Error::Invalid("SPI device not open")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::STATUS_COM_ERROR;

    #[test]
    fn word_reverse_is_a_plain_byte_swap() {
        assert_eq!(word_reverse(0x1234_5678), 0x7856_3412);
        assert_eq!(word_reverse(0), 0);
        assert_eq!(word_reverse(word_reverse(0xDEAD_BEEF)), 0xDEAD_BEEF);
    }

    #[test]
    fn close_is_idempotent_on_an_unopened_handle() {
        let mut handle = PlatformHandle::default();
        assert!(!handle.is_open());
        handle.close();
        handle.close();
        assert!(!handle.is_open());
    }

    #[test]
    fn pin_sets_on_unset_slots_are_silent() {
        let mut handle = PlatformHandle::default();
        handle.rst_set(true);
        handle.rst_set(false);
        handle.cs_set(true);
        handle.cs_set(false);
    }

    #[test]
    fn transfers_on_unset_spi_slot_are_com_errors() {
        let mut handle = PlatformHandle::default();
        let tx = [0u8; 4];
        let mut rx = [0u8; 4];
        let err = handle.spi_transfer(Some(&tx), Some(&mut rx)).unwrap_err();
        assert_eq!(err.status(), STATUS_COM_ERROR);
        let err = handle.spi_fifo_read(&mut rx, 2).unwrap_err();
        assert_eq!(err.status(), STATUS_COM_ERROR);
    }
}
