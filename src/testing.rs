//! Scripted [`Platform`] implementation for driving the protocol engine
//! and the frame streamer without hardware.

use std::collections::VecDeque;

use crate::error::Result;
use crate::platform::Platform;

/// Records every platform call and answers register transfers from a
/// queue of scripted response words (big-endian on the wire, GSR0 in the
/// top byte). An empty queue answers with `default_word`.
#[derive(Default)]
pub struct MockPlatform {
    pub responses: VecDeque<u32>,
    pub default_word: u32,
    /// Transmit bytes of every `spi_transfer`, in call order.
    pub sent: Vec<Vec<u8>>,
    /// Sample counts of every `spi_fifo_read`, in call order.
    pub fifo_reads: Vec<usize>,
    /// Byte used to fill FIFO read buffers.
    pub fifo_fill: u8,
    pub cs: Vec<bool>,
    pub rst: Vec<bool>,
    pub delays_ms: Vec<u32>,
}

impl MockPlatform {
    pub fn push_word(&mut self, word: u32) {
        self.responses.push_back(word);
    }
}

impl Platform for MockPlatform {
    fn rst_set(&mut self, high: bool) {
        self.rst.push(high);
    }

    fn cs_set(&mut self, high: bool) {
        self.cs.push(high);
    }

    fn spi_transfer(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()> {
        self.sent.push(tx.map(<[u8]>::to_vec).unwrap_or_default());
        if let Some(rx) = rx {
            let word = self.responses.pop_front().unwrap_or(self.default_word);
            let bytes = word.to_be_bytes();
            let n = rx.len().min(bytes.len());
            rx[..n].copy_from_slice(&bytes[..n]);
        }
        Ok(())
    }

    fn spi_fifo_read(&mut self, rx: &mut [u8], sample_count: usize) -> Result<()> {
        self.fifo_reads.push(sample_count);
        rx.fill(self.fifo_fill);
        Ok(())
    }

    // Never sleep in tests.
    fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
    }
}
