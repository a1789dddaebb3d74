use std::io;

use thiserror::Error;

/// Status codes shared with the vendor protocol-engine ABI. The numeric
/// values are an external compatibility surface; do not renumber.
pub const STATUS_OK: i32 = 0;
/// SPI/GPIO communication failure (open, configure, transfer, line request).
pub const STATUS_COM_ERROR: i32 = 1;
/// Unknown or unsupported device detected during initialization.
pub const STATUS_DEV_ERROR: i32 = 2;
/// A device operation did not complete within its polling budget.
pub const STATUS_TIMEOUT_ERROR: i32 = 3;
/// The GSR0 status byte reported SPI burst/clock/FIFO errors.
pub const STATUS_GSR0_ERROR: i32 = 4;

/// Driver error type. Every variant maps onto one of the fixed status
/// codes via [`Error::status`].
#[derive(Debug, Error)]
pub enum Error {
    /// SPI device open/configure/transfer failure.
    #[error("SPI communication failed: {0}")]
    Spi(#[from] io::Error),

    /// GPIO chip open, line request, or line set failure.
    #[error("GPIO communication failed: {0}")]
    Gpio(#[from] gpio_cdev::Error),

    /// A precondition was violated; no ioctl was issued.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),

    /// Chip-ID readback did not match any known BGT60TRxx device.
    #[error("unknown or unsupported radar device")]
    Device,

    /// Polling for a self-clearing register bit ran out of attempts.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// GSR0 flagged a FIFO overflow/underflow, SPI burst, or clock error.
    #[error("GSR0 reported SPI transfer errors (0x{0:02x})")]
    Gsr0(u8),
}

impl Error {
    /// Collapses the error into the vendor status code.
    pub fn status(&self) -> i32 {
        match self {
            Error::Spi(_) | Error::Gpio(_) | Error::Invalid(_) => STATUS_COM_ERROR,
            Error::Device => STATUS_DEV_ERROR,
            Error::Timeout(_) => STATUS_TIMEOUT_ERROR,
            Error::Gsr0(_) => STATUS_GSR0_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(STATUS_OK, 0);
        assert_eq!(STATUS_COM_ERROR, 1);
        assert_eq!(STATUS_DEV_ERROR, 2);
        assert_eq!(STATUS_TIMEOUT_ERROR, 3);
        assert_eq!(STATUS_GSR0_ERROR, 4);
    }

    #[test]
    fn status_codes_are_pairwise_distinct() {
        let codes = [
            STATUS_OK,
            STATUS_COM_ERROR,
            STATUS_DEV_ERROR,
            STATUS_TIMEOUT_ERROR,
            STATUS_GSR0_ERROR,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn error_variants_map_to_their_status() {
        let com = Error::Spi(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(com.status(), STATUS_COM_ERROR);
        assert_eq!(Error::Invalid("empty").status(), STATUS_COM_ERROR);
        assert_eq!(Error::Device.status(), STATUS_DEV_ERROR);
        assert_eq!(Error::Timeout("soft reset").status(), STATUS_TIMEOUT_ERROR);
        assert_eq!(Error::Gsr0(0x0a).status(), STATUS_GSR0_ERROR);
    }
}
