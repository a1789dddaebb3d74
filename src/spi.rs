//! SPI transport over the Linux spidev interface.

use std::path::Path;

use log::error;
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};

use crate::error::{Error, Result};

/// The sensor talks SPI mode 0.
pub const SPI_MODE: SpiModeFlags = SpiModeFlags::SPI_MODE_0;
pub const SPI_BITS_PER_WORD: u8 = 8;
/// 10 MHz; the highest rate the sensor supports without high-speed MISO.
pub const SPI_MAX_SPEED_HZ: u32 = 10_000_000;

/// Idle pattern clocked out while the sensor streams FIFO data back.
pub const FIFO_DUMMY_BYTE: u8 = 0xFF;

/// A configured spidev device node.
pub struct SpiBus {
    dev: Spidev,
}

impl SpiBus {
    /// Opens `path` and configures mode, word size, and clock.
    ///
    /// Any open or configure failure closes the descriptor again before
    /// the error is returned.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut dev = Spidev::open(path).map_err(|e| {
            error!("Failed to open SPI device {}: {}", path.display(), e);
            Error::Spi(e)
        })?;

        let options = SpidevOptions::new()
            .bits_per_word(SPI_BITS_PER_WORD)
            .max_speed_hz(SPI_MAX_SPEED_HZ)
            .mode(SPI_MODE)
            .build();
        // `dev` is dropped (closed) if configuration fails.
        dev.configure(&options).map_err(|e| {
            error!("Failed to configure SPI device {}: {}", path.display(), e);
            Error::Spi(e)
        })?;

        Ok(Self { dev })
    }

    /// One synchronous full-duplex exchange.
    ///
    /// Requires at least one buffer; when both are given their lengths must
    /// match. Violations are reported without touching the device.
    pub fn transfer(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()> {
        transfer_len(tx, rx.as_deref())?;
        let mut xfer = match (tx, rx) {
            (Some(tx), Some(rx)) => SpidevTransfer::read_write(tx, rx),
            (Some(tx), None) => SpidevTransfer::write(tx),
            (None, Some(rx)) => SpidevTransfer::read(rx),
            (None, None) => unreachable!("rejected by transfer_len"),
        };
        self.dev.transfer(&mut xfer).map_err(|e| {
            error!("SPI transfer failed: {}", e);
            Error::Spi(e)
        })
    }

    /// Burst-reads `sample_count` 16-bit FIFO samples into `rx`.
    ///
    /// The sensor expects the host to clock out 0xFF while it streams data,
    /// so a scratch transmit buffer of `sample_count * 2` dummy bytes backs
    /// exactly one full-duplex transfer.
    pub fn fifo_read(&mut self, rx: &mut [u8], sample_count: usize) -> Result<()> {
        if sample_count == 0 {
            return Err(Error::Invalid("FIFO read of zero samples"));
        }
        let byte_len = sample_count * 2;
        if rx.len() != byte_len {
            return Err(Error::Invalid(
                "FIFO buffer length does not match sample count",
            ));
        }
        let tx = fifo_dummy_tx(sample_count);
        let mut xfer = SpidevTransfer::read_write(&tx, rx);
        self.dev.transfer(&mut xfer).map_err(|e| {
            error!("SPI FIFO read failed: {}", e);
            Error::Spi(e)
        })
    }
}

/// Builds the dummy transmit pattern for a FIFO burst of `sample_count`
/// 16-bit samples.
pub(crate) fn fifo_dummy_tx(sample_count: usize) -> Vec<u8> {
    vec![FIFO_DUMMY_BYTE; sample_count * 2]
}

/// Validates transfer buffers and returns the exchange length in bytes.
pub(crate) fn transfer_len(tx: Option<&[u8]>, rx: Option<&[u8]>) -> Result<usize> {
    let len = match (tx, rx) {
        (None, None) => return Err(Error::Invalid("neither buffer supplied")),
        (Some(tx), Some(rx)) => {
            if tx.len() != rx.len() {
                return Err(Error::Invalid("tx/rx length mismatch"));
            }
            tx.len()
        }
        (Some(tx), None) => tx.len(),
        (None, Some(rx)) => rx.len(),
    };
    if len == 0 {
        return Err(Error::Invalid("zero-length transfer"));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::STATUS_COM_ERROR;

    #[test]
    fn dummy_pattern_is_two_bytes_per_sample_all_ff() {
        let tx = fifo_dummy_tx(37);
        assert_eq!(tx.len(), 74);
        assert!(tx.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn transfer_len_accepts_matching_buffers() {
        let tx = [0u8; 4];
        let rx = [0u8; 4];
        assert_eq!(transfer_len(Some(&tx), Some(&rx)).unwrap(), 4);
        assert_eq!(transfer_len(Some(&tx), None).unwrap(), 4);
        assert_eq!(transfer_len(None, Some(&rx)).unwrap(), 4);
    }

    #[test]
    fn transfer_len_rejects_bad_shapes() {
        let a = [0u8; 4];
        let b = [0u8; 2];
        let empty: [u8; 0] = [];
        for err in [
            transfer_len(None, None).unwrap_err(),
            transfer_len(Some(&a), Some(&b)).unwrap_err(),
            transfer_len(Some(&empty), None).unwrap_err(),
            transfer_len(None, Some(&empty)).unwrap_err(),
        ] {
            assert_eq!(err.status(), STATUS_COM_ERROR);
        }
    }
}
