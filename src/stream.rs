//! Background frame acquisition.
//!
//! A worker thread owns the sensor, drains the FIFO in bursts, and
//! assembles fixed-size frames that are handed to the application over a
//! bounded channel. The loop is poll-driven: this platform requests no IRQ
//! line, so FIFO fill level is read from FSTAT between bursts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, warn};

use crate::device::Bgt60trxx;
use crate::error::{Error, Result};
use crate::platform::Platform;

/// Acquisition parameters, all in 16-bit samples.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Samples per delivered frame.
    pub samples_per_frame: usize,
    /// Upper bound on samples read per SPI burst.
    pub samples_per_burst: usize,
    /// FIFO fill threshold programmed into SFCTL.
    pub threshold_samples: u32,
}

/// Queue depth of the frame channel.
const FRAME_QUEUE: usize = 256;
/// Poll interval while the FIFO is empty.
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Handle to a running acquisition thread.
pub struct FrameStream {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FrameStream {
    /// Starts acquisition on `radar` and returns the stream handle plus
    /// the frame channel. The sensor moves onto the worker thread and is
    /// torn down there when the stream stops.
    pub fn start<P>(radar: Bgt60trxx<P>, config: StreamConfig) -> Result<(Self, Receiver<Vec<u8>>)>
    where
        P: Platform + Send + 'static,
    {
        if config.samples_per_frame == 0 || config.samples_per_frame % 2 != 0 {
            return Err(Error::Invalid("samples per frame must be even and non-zero"));
        }
        if config.samples_per_burst == 0 || config.samples_per_burst % 2 != 0 {
            return Err(Error::Invalid("samples per burst must be even and non-zero"));
        }
        // Caught here rather than on the worker thread, where the caller
        // would only see a disconnected channel.
        if config.threshold_samples == 0
            || config.threshold_samples % 2 != 0
            || config.threshold_samples > u32::from(radar.fifo_size())
        {
            return Err(Error::Invalid("FIFO threshold out of range or odd"));
        }

        let (tx, rx) = bounded(FRAME_QUEUE);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            let mut radar = radar;
            run(&mut radar, config, &tx, &stop_flag);
            // Dropping the sensor here releases the platform descriptors.
            debug!("Frame acquisition thread stopped");
        });

        Ok((
            Self {
                stop,
                thread: Some(thread),
            },
            rx,
        ))
    }

    /// Signals the worker to stop and joins it. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<P: Platform>(
    radar: &mut Bgt60trxx<P>,
    config: StreamConfig,
    frames: &Sender<Vec<u8>>,
    stop: &AtomicBool,
) {
    if let Err(e) = radar
        .set_fifo_limit(config.threshold_samples)
        .and_then(|_| radar.start_frame(true))
    {
        error!("Failed to start frame acquisition: {}", e);
        return;
    }
    debug!("Frame acquisition thread started");

    let mut assembler = FrameAssembler::new(config.samples_per_frame * 2);
    let mut burst = vec![0u8; config.samples_per_burst * 2];

    'acquire: while !stop.load(Ordering::SeqCst) {
        let status = match radar.fifo_status() {
            Ok(status) => status,
            Err(e) => {
                error!("Failed to read FIFO status: {}", e);
                break;
            }
        };

        if status.has_error() {
            error!(
                "FIFO errors (FOF {}, FUF {}, BURST {}, CLK {}); resetting FIFO",
                status.overflow as u8,
                status.underflow as u8,
                status.burst_error as u8,
                status.clock_error as u8
            );
            // Partial frame data is stale after a FIFO reset.
            assembler.clear();
            if let Err(e) = radar.reset_fifo().and_then(|_| radar.start_frame(true)) {
                error!("FIFO recovery failed: {}", e);
                break;
            }
            continue;
        }

        let available = status.available_samples() as usize;
        if status.empty || available < 2 {
            thread::sleep(IDLE_POLL);
            continue;
        }

        // Whole FIFO words only.
        let take = available.min(config.samples_per_burst) & !1;
        if let Err(e) = radar.get_fifo_data(&mut burst[..take * 2], take) {
            error!("FIFO read failed: {}", e);
            break;
        }
        for frame in assembler.push(&burst[..take * 2]) {
            match frames.try_send(frame) {
                Ok(()) => {}
                // Never block the FIFO drain on a slow consumer; the
                // sensor would overflow long before the queue empties.
                Err(TrySendError::Full(_)) => warn!("Frame queue full; dropping frame"),
                Err(TrySendError::Disconnected(_)) => break 'acquire,
            }
        }
    }

    if let Err(e) = radar.start_frame(false) {
        error!("Failed to stop frame acquisition: {}", e);
    }
}

/// Accumulates FIFO bursts and slices them into fixed-size frames.
pub struct FrameAssembler {
    frame_len: usize,
    buf: Vec<u8>,
}

impl FrameAssembler {
    /// `frame_len` is the frame size in bytes and must be non-zero.
    pub fn new(frame_len: usize) -> Self {
        assert!(frame_len > 0, "frame length must be non-zero");
        Self {
            frame_len,
            buf: Vec::new(),
        }
    }

    /// Appends burst data and returns every complete frame now available.
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(data);
        let mut frames = Vec::new();
        while self.buf.len() >= self.frame_len {
            frames.push(self.buf.drain(..self.frame_len).collect());
        }
        frames
    }

    /// Discards any buffered partial frame.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
