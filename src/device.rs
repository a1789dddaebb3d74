//! Register protocol engine for the BGT60TRxx family.
//!
//! Everything here speaks through the [`Platform`] trait, so the same code
//! drives real hardware via [`PlatformHandle`](crate::platform::PlatformHandle)
//! and scripted mocks in tests.

use std::fmt;

use log::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::regs::*;

/// Detected sensor variant. The numeric ids mirror the vendor enum and are
/// an external compatibility surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Bgt60tr13c,
    Bgt60utr13d,
    Bgt60utr11,
    Unknown,
}

impl DeviceType {
    /// Vendor enum value (TR13C = 0, UTR13D = 1, UTR11 = 2, unknown = -1).
    pub fn id(self) -> i32 {
        match self {
            DeviceType::Bgt60tr13c => 0,
            DeviceType::Bgt60utr13d => 1,
            DeviceType::Bgt60utr11 => 2,
            DeviceType::Unknown => -1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceType::Bgt60tr13c => "BGT60TR13C",
            DeviceType::Bgt60utr13d => "BGT60UTR13D",
            DeviceType::Bgt60utr11 => "BGT60UTR11",
            DeviceType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-variant identification and register map entry.
struct DeviceEntry {
    digital_id: u32,
    rf_id: u32,
    device: DeviceType,
    /// FIFO capacity in samples.
    fifo_size: u16,
    fstat_reg: u32,
    fifo_reg: u32,
}

static KNOWN_DEVICES: [DeviceEntry; 3] = [
    DeviceEntry {
        digital_id: 3,
        rf_id: 3,
        device: DeviceType::Bgt60tr13c,
        fifo_size: 8192,
        fstat_reg: 0x63,
        fifo_reg: 0x64,
    },
    DeviceEntry {
        digital_id: 6,
        rf_id: 6,
        device: DeviceType::Bgt60utr13d,
        fifo_size: 8192,
        fstat_reg: 0x65,
        fifo_reg: 0x66,
    },
    DeviceEntry {
        digital_id: 7,
        rf_id: 7,
        device: DeviceType::Bgt60utr11,
        fifo_size: 2048,
        fstat_reg: 0x5F,
        fifo_reg: 0x60,
    },
];

static UNKNOWN_DEVICE: DeviceEntry = DeviceEntry {
    digital_id: 0,
    rf_id: 0,
    device: DeviceType::Unknown,
    fifo_size: 0,
    fstat_reg: 0,
    fifo_reg: 0,
};

/// Decoded FSTAT register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FifoStatus {
    /// Raw register word as read.
    pub raw: u32,
    /// Buffered FIFO words (one word = two samples).
    pub fill_words: u32,
    pub empty: bool,
    pub full: bool,
    pub at_threshold: bool,
    pub overflow: bool,
    pub underflow: bool,
    pub burst_error: bool,
    pub clock_error: bool,
}

impl FifoStatus {
    pub fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            fill_words: (raw & REG_FSTAT_FILL_STATUS_MSK) >> REG_FSTAT_FILL_STATUS_POS,
            empty: raw & REG_FSTAT_EMPTY_MSK != 0,
            full: raw & REG_FSTAT_FULL_MSK != 0,
            at_threshold: raw & REG_FSTAT_CREF_MSK != 0,
            overflow: raw & REG_FSTAT_FOF_ERR_MSK != 0,
            underflow: raw & REG_FSTAT_FUF_ERR_MSK != 0,
            burst_error: raw & REG_FSTAT_SPI_BURST_ERR_MSK != 0,
            clock_error: raw & REG_FSTAT_CLK_NUM_ERR_MSK != 0,
        }
    }

    /// True if any of the FIFO error flags is raised.
    pub fn has_error(&self) -> bool {
        self.overflow || self.underflow || self.burst_error || self.clock_error
    }

    /// Samples currently readable from the FIFO.
    pub fn available_samples(&self) -> u32 {
        self.fill_words * NUM_SAMPLES_FIFO_WORD as u32
    }
}

/// Self-clearing reset bits in the MAIN register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reset {
    /// Full software reset.
    Sw,
    /// Frame state machine reset; also stops a running frame.
    Fsm,
    /// FIFO reset; discards buffered samples.
    Fifo,
}

impl Reset {
    fn mask(self) -> u32 {
        match self {
            Reset::Sw => REG_MAIN_SW_RESET_MSK,
            Reset::Fsm => REG_MAIN_FSM_RESET_MSK,
            Reset::Fifo => REG_MAIN_FIFO_RESET_MSK,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Reset::Sw => "software reset",
            Reset::Fsm => "FSM reset",
            Reset::Fifo => "FIFO reset",
        }
    }
}

const CHIP_ID_ATTEMPTS: usize = 3;
const RESET_POLL_ATTEMPTS: usize = 50;
const RESET_POLL_MS: u32 = 10;
const RESET_SETTLE_MS: u32 = 10;
const HARD_RESET_PULSE_MS: u32 = 10;
const HARD_RESET_SETTLE_MS: u32 = 50;

/// Builds the FIFO burst-mode command word. Length 0 keeps the burst
/// unbounded so long reads do not trip the sensor's clock-count check.
fn burst_cmd(fifo_reg: u32) -> u32 {
    SPI_BURST_MODE_CMD | ((fifo_reg << SPI_BURST_MODE_SADR_POS) & SPI_BURST_MODE_SADR_MSK)
        | SPI_BURST_MODE_RWB_MSK
}

/// One BGT60TRxx sensor on top of a [`Platform`].
///
/// Owns the platform exclusively; the engine itself holds no OS resources,
/// so teardown is teardown of the platform alone.
pub struct Bgt60trxx<P: Platform> {
    iface: P,
    entry: &'static DeviceEntry,
    last_gsr: u8,
}

impl<P: Platform> Bgt60trxx<P> {
    /// Hard-resets the sensor, detects the device via its chip ID, and
    /// programs the SFCTL data-format bits.
    ///
    /// With `high_speed` the MISO high-speed read bit is set for SPI clocks
    /// above 20 MHz. On any failure the platform is dropped, which releases
    /// its descriptors, so a failed sensor init never leaks the handle.
    pub fn new(iface: P, high_speed: bool) -> Result<Self> {
        let mut dev = Self {
            iface,
            entry: &UNKNOWN_DEVICE,
            last_gsr: 0,
        };
        dev.hard_reset();
        dev.detect()?;
        dev.configure_sfctl(high_speed)?;
        info!(
            "Detected {} (FIFO {} samples)",
            dev.entry.device, dev.entry.fifo_size
        );
        Ok(dev)
    }

    pub fn device(&self) -> DeviceType {
        self.entry.device
    }

    /// FIFO capacity of the detected device, in samples.
    pub fn fifo_size(&self) -> u16 {
        self.entry.fifo_size
    }

    /// GSR0 byte latched from the most recent transfer.
    pub fn last_gsr(&self) -> u8 {
        self.last_gsr
    }

    fn detect(&mut self) -> Result<()> {
        for attempt in 1..=CHIP_ID_ATTEMPTS {
            match self.get_reg(REG_CHIP_ID) {
                Ok(chip_id) => {
                    let digital =
                        (chip_id & REG_CHIP_ID_DIGITAL_ID_MSK) >> REG_CHIP_ID_DIGITAL_ID_POS;
                    let rf = (chip_id & REG_CHIP_ID_RF_ID_MSK) >> REG_CHIP_ID_RF_ID_POS;
                    if let Some(entry) = KNOWN_DEVICES
                        .iter()
                        .find(|e| e.digital_id == digital && e.rf_id == rf)
                    {
                        debug!("Chip ID 0x{:06X} -> {}", chip_id, entry.device);
                        self.entry = entry;
                        return Ok(());
                    }
                    warn!(
                        "Unrecognized chip ID 0x{:06X} (digital {}, rf {})",
                        chip_id, digital, rf
                    );
                }
                Err(e) => error!("Failed to read CHIP_ID (attempt {}): {}", attempt, e),
            }
        }
        Err(Error::Device)
    }

    // Raw FIFO words, no prefix header, no test pattern; MISO high-speed
    // read only when the bus is clocked above 20 MHz.
    fn configure_sfctl(&mut self, high_speed: bool) -> Result<()> {
        let mut sfctl = self.get_reg(REG_SFCTL)?;
        if high_speed {
            sfctl |= REG_SFCTL_MISO_HS_READ_MSK;
        } else {
            sfctl &= !REG_SFCTL_MISO_HS_READ_MSK;
        }
        sfctl &= !(REG_SFCTL_LFSR_EN_MSK | REG_SFCTL_PREFIX_EN_MSK | REG_SFCTL_FIFO_LP_MODE_MSK);
        self.set_reg(REG_SFCTL, sfctl)
    }

    /// Sends one framed word with CS held low and latches the GSR0 byte
    /// clocked back first.
    fn transfer_word(&mut self, word: u32) -> Result<u32> {
        let tx = word.to_be_bytes();
        let mut rx = [0u8; 4];
        self.iface.cs_set(false);
        let res = self.iface.spi_transfer(Some(&tx), Some(&mut rx));
        self.iface.cs_set(true);
        res?;
        self.last_gsr = rx[0];
        Ok(u32::from_be_bytes(rx))
    }

    /// Reads a register and returns its 24-bit payload.
    pub fn get_reg(&mut self, addr: u32) -> Result<u32> {
        let word = (addr << SPI_REGADR_POS) & SPI_REGADR_MSK;
        Ok(self.transfer_word(word)? & SPI_DATA_MSK)
    }

    /// Writes the 24-bit payload of a register.
    pub fn set_reg(&mut self, addr: u32, data: u32) -> Result<()> {
        let word = ((addr << SPI_REGADR_POS) & SPI_REGADR_MSK)
            | SPI_WR_OP_MSK
            | ((data << SPI_DATA_POS) & SPI_DATA_MSK);
        self.transfer_word(word)?;
        Ok(())
    }

    /// Applies a list of pre-packed register words (the vendor register
    /// export format: address and payload already framed per word).
    pub fn apply_config(&mut self, regs: &[u32]) -> Result<()> {
        for &word in regs {
            self.transfer_word(word | SPI_WR_OP_MSK)?;
        }
        debug!("Applied {} configuration words", regs.len());
        Ok(())
    }

    /// Reads and decodes the per-device FSTAT register.
    pub fn fifo_status(&mut self) -> Result<FifoStatus> {
        Ok(FifoStatus::from_raw(self.get_reg(self.entry.fstat_reg)?))
    }

    /// Programs the FIFO threshold. `samples` must be even, non-zero, and
    /// within the device's FIFO capacity.
    pub fn set_fifo_limit(&mut self, samples: u32) -> Result<()> {
        if samples == 0 || samples % 2 != 0 || samples > u32::from(self.entry.fifo_size) {
            return Err(Error::Invalid("FIFO limit out of range or odd"));
        }
        let mut sfctl = self.get_reg(REG_SFCTL)?;
        sfctl &= !REG_SFCTL_FIFO_CREF_MSK;
        sfctl |= ((samples / 2) << REG_SFCTL_FIFO_CREF_POS) & REG_SFCTL_FIFO_CREF_MSK;
        self.set_reg(REG_SFCTL, sfctl)
    }

    /// Burst-reads `sample_count` samples from the FIFO into `rx`
    /// (`rx.len()` must be `sample_count * 2`).
    ///
    /// CS stays low across the 4-byte burst header and the data phase; the
    /// GSR0 byte from the header is checked afterwards.
    pub fn get_fifo_data(&mut self, rx: &mut [u8], sample_count: usize) -> Result<()> {
        if sample_count == 0
            || sample_count % 2 != 0
            || sample_count > usize::from(self.entry.fifo_size)
        {
            return Err(Error::Invalid("FIFO sample count out of range or odd"));
        }
        if rx.len() != sample_count * 2 {
            return Err(Error::Invalid(
                "FIFO buffer length does not match sample count",
            ));
        }

        let header = burst_cmd(self.entry.fifo_reg).to_be_bytes();
        let mut header_rx = [0u8; SPI_BURST_HEADER_SIZE_BYTES];
        self.iface.cs_set(false);
        let res = self
            .iface
            .spi_transfer(Some(&header), Some(&mut header_rx))
            .and_then(|_| self.iface.spi_fifo_read(rx, sample_count));
        self.iface.cs_set(true);
        res?;
        self.last_gsr = header_rx[0];
        self.check_gsr()
    }

    /// Fails with a GSR0 error if the latched status byte carries any of
    /// the transfer-error flags.
    pub fn check_gsr(&self) -> Result<()> {
        if self.last_gsr & REG_GSR0_ERR_MSK != 0 {
            Err(Error::Gsr0(self.last_gsr))
        } else {
            Ok(())
        }
    }

    /// Starts frame acquisition, or stops it via an FSM reset.
    pub fn start_frame(&mut self, start: bool) -> Result<()> {
        if start {
            let main = self.get_reg(REG_MAIN)?;
            self.set_reg(REG_MAIN, main | REG_MAIN_FRAME_START_MSK)
        } else {
            self.soft_reset(Reset::Fsm)
        }
    }

    /// Sets a self-clearing reset bit and polls until the device clears it.
    pub fn soft_reset(&mut self, kind: Reset) -> Result<()> {
        let main = self.get_reg(REG_MAIN)?;
        self.set_reg(REG_MAIN, main | kind.mask())?;
        for _ in 0..RESET_POLL_ATTEMPTS {
            self.iface.delay_ms(RESET_POLL_MS);
            if self.get_reg(REG_MAIN)? & kind.mask() == 0 {
                self.iface.delay_ms(RESET_SETTLE_MS);
                return Ok(());
            }
        }
        Err(Error::Timeout(kind.name()))
    }

    /// Discards buffered FIFO contents.
    pub fn reset_fifo(&mut self) -> Result<()> {
        self.soft_reset(Reset::Fifo)
    }

    /// Pulses the reset pin high-low-high with settle delays. CS is held
    /// deasserted throughout.
    pub fn hard_reset(&mut self) {
        self.iface.cs_set(true);
        self.iface.rst_set(true);
        self.iface.delay_ms(HARD_RESET_PULSE_MS);
        self.iface.rst_set(false);
        self.iface.delay_ms(HARD_RESET_PULSE_MS);
        self.iface.rst_set(true);
        self.iface.delay_ms(HARD_RESET_SETTLE_MS);
    }
}

impl Bgt60trxx<crate::platform::PlatformHandle> {
    /// Tears down the underlying platform handle. The engine owns no OS
    /// resources of its own, so this closes everything; repeated calls are
    /// no-ops.
    pub fn close(&mut self) {
        self.iface.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{STATUS_COM_ERROR, STATUS_DEV_ERROR, STATUS_GSR0_ERROR, STATUS_TIMEOUT_ERROR};
    use crate::testing::MockPlatform;

    /// Chip-ID payload for a TR13C (digital id 3, rf id 3).
    const TR13C_CHIP_ID: u32 = (3 << REG_CHIP_ID_DIGITAL_ID_POS) | (3 << REG_CHIP_ID_RF_ID_POS);

    fn tr13c(iface: MockPlatform) -> Bgt60trxx<MockPlatform> {
        Bgt60trxx {
            iface,
            entry: &KNOWN_DEVICES[0],
            last_gsr: 0,
        }
    }

    #[test]
    fn init_detects_tr13c_and_programs_sfctl() {
        let mut mock = MockPlatform::default();
        mock.push_word(TR13C_CHIP_ID); // CHIP_ID read
        mock.push_word(
            REG_SFCTL_LFSR_EN_MSK | REG_SFCTL_PREFIX_EN_MSK | REG_SFCTL_MISO_HS_READ_MSK,
        ); // SFCTL read

        let dev = Bgt60trxx::new(mock, false).unwrap();
        assert_eq!(dev.device(), DeviceType::Bgt60tr13c);
        assert_eq!(dev.device().id(), 0);
        assert_eq!(dev.fifo_size(), 8192);

        // Hard reset pulsed the pin high-low-high with CS deasserted.
        assert_eq!(dev.iface.rst, vec![true, false, true]);
        assert_eq!(dev.iface.cs[0], true);
        assert_eq!(dev.iface.delays_ms[..3], [10, 10, 50]);

        // First transfer is the CHIP_ID read word.
        let chip_id_word = (REG_CHIP_ID << SPI_REGADR_POS) & SPI_REGADR_MSK;
        assert_eq!(dev.iface.sent[0], chip_id_word.to_be_bytes().to_vec());

        // SFCTL write cleared the format bits and kept high-speed off.
        let sfctl_write = ((REG_SFCTL << SPI_REGADR_POS) & SPI_REGADR_MSK) | SPI_WR_OP_MSK;
        assert_eq!(dev.iface.sent[2], sfctl_write.to_be_bytes().to_vec());
    }

    #[test]
    fn init_fails_with_dev_error_on_unknown_chip() {
        let mut mock = MockPlatform::default();
        mock.push_word(0x00_0102); // not a known (digital, rf) pair
        let err = Bgt60trxx::new(mock, false).err().unwrap();
        assert_eq!(err.status(), STATUS_DEV_ERROR);
    }

    #[test]
    fn get_reg_frames_the_address_and_masks_the_payload() {
        let mut mock = MockPlatform::default();
        mock.push_word(0xAB12_3456); // GSR0 byte 0xAB, payload 0x123456
        let mut dev = tr13c(mock);

        let value = dev.get_reg(REG_STAT1).unwrap();
        assert_eq!(value, 0x12_3456);
        assert_eq!(dev.last_gsr(), 0xAB);

        let expected = (REG_STAT1 << SPI_REGADR_POS) & SPI_REGADR_MSK;
        assert_eq!(dev.iface.sent[0], expected.to_be_bytes().to_vec());
        // CS framed the transfer low then high.
        assert_eq!(dev.iface.cs, vec![false, true]);
    }

    #[test]
    fn set_reg_sets_the_write_bit_and_masks_the_payload() {
        let mut dev = tr13c(MockPlatform::default());
        dev.set_reg(REG_SFCTL, 0xFF12_3456).unwrap();
        let expected = ((REG_SFCTL << SPI_REGADR_POS) & SPI_REGADR_MSK)
            | SPI_WR_OP_MSK
            | 0x0012_3456;
        assert_eq!(dev.iface.sent[0], expected.to_be_bytes().to_vec());
    }

    #[test]
    fn apply_config_forces_the_write_bit_on_every_word() {
        let mut dev = tr13c(MockPlatform::default());
        dev.apply_config(&[0x0600_1234, 0x0A00_0001]).unwrap();
        assert_eq!(dev.iface.sent.len(), 2);
        assert_eq!(
            dev.iface.sent[0],
            (0x0600_1234u32 | SPI_WR_OP_MSK).to_be_bytes().to_vec()
        );
    }

    #[test]
    fn fifo_burst_sends_header_then_one_dummy_read() {
        let mut dev = tr13c(MockPlatform::default());
        let mut rx = [0u8; 64];
        dev.get_fifo_data(&mut rx, 32).unwrap();

        // TR13C FIFO register 0x64 framed as an unbounded burst read.
        assert_eq!(dev.iface.sent.len(), 1);
        assert_eq!(dev.iface.sent[0], vec![0xFF, 0xC9, 0x00, 0x00]);
        // Exactly one FIFO read of the requested sample count.
        assert_eq!(dev.iface.fifo_reads, vec![32]);
        // CS held low across header and data.
        assert_eq!(dev.iface.cs, vec![false, true]);
    }

    #[test]
    fn fifo_burst_rejects_bad_sample_counts() {
        let mut dev = tr13c(MockPlatform::default());
        let mut rx = [0u8; 64];
        for count in [0usize, 31, 9000] {
            let err = dev.get_fifo_data(&mut rx, count).unwrap_err();
            assert_eq!(err.status(), STATUS_COM_ERROR);
        }
        // Mismatched buffer length.
        assert!(dev.get_fifo_data(&mut rx, 16).is_err());
        assert!(dev.iface.fifo_reads.is_empty());
    }

    #[test]
    fn fifo_burst_surfaces_gsr0_errors() {
        let mut mock = MockPlatform::default();
        // Header response with FIFO-overflow and burst-error flags set.
        mock.push_word(u32::from(REG_GSR0_FOU_ERR_MSK | REG_GSR0_SPI_BURST_ERR_MSK) << 24);
        let mut dev = tr13c(mock);
        let mut rx = [0u8; 8];
        let err = dev.get_fifo_data(&mut rx, 4).unwrap_err();
        assert_eq!(err.status(), STATUS_GSR0_ERROR);
    }

    #[test]
    fn set_fifo_limit_programs_the_threshold_field() {
        let mut dev = tr13c(MockPlatform::default());
        dev.set_fifo_limit(4096).unwrap();
        let expected = ((REG_SFCTL << SPI_REGADR_POS) & SPI_REGADR_MSK)
            | SPI_WR_OP_MSK
            | (2048 << REG_SFCTL_FIFO_CREF_POS);
        assert_eq!(dev.iface.sent[1], expected.to_be_bytes().to_vec());

        for bad in [0u32, 3, 9000] {
            assert!(dev.set_fifo_limit(bad).is_err());
        }
    }

    #[test]
    fn start_frame_sets_the_frame_start_bit() {
        let mut dev = tr13c(MockPlatform::default());
        dev.start_frame(true).unwrap();
        let expected = ((REG_MAIN << SPI_REGADR_POS) & SPI_REGADR_MSK)
            | SPI_WR_OP_MSK
            | REG_MAIN_FRAME_START_MSK;
        assert_eq!(dev.iface.sent[1], expected.to_be_bytes().to_vec());
    }

    #[test]
    fn soft_reset_times_out_when_the_bit_never_clears() {
        let mut mock = MockPlatform::default();
        // Every read keeps the reset bit asserted.
        mock.default_word = REG_MAIN_SW_RESET_MSK;
        let mut dev = tr13c(mock);
        let err = dev.soft_reset(Reset::Sw).unwrap_err();
        assert_eq!(err.status(), STATUS_TIMEOUT_ERROR);
        assert_eq!(dev.iface.delays_ms.len(), RESET_POLL_ATTEMPTS);
    }

    #[test]
    fn soft_reset_succeeds_once_the_bit_clears() {
        let mut mock = MockPlatform::default();
        mock.push_word(0); // MAIN read
        mock.push_word(0); // MAIN write echo
        mock.push_word(0); // first poll: bit already clear
        let mut dev = tr13c(mock);
        dev.soft_reset(Reset::Fifo).unwrap();
        // One poll delay plus the settle delay.
        assert_eq!(dev.iface.delays_ms, vec![RESET_POLL_MS, RESET_SETTLE_MS]);
    }

    #[test]
    fn fifo_status_decodes_fill_and_flags() {
        let raw = 0x1234
            | REG_FSTAT_EMPTY_MSK
            | REG_FSTAT_FOF_ERR_MSK
            | REG_FSTAT_SPI_BURST_ERR_MSK;
        let status = FifoStatus::from_raw(raw);
        assert_eq!(status.fill_words, 0x1234);
        assert_eq!(status.available_samples(), 0x1234 * 2);
        assert!(status.empty);
        assert!(status.overflow);
        assert!(status.burst_error);
        assert!(!status.underflow);
        assert!(status.has_error());

        assert!(!FifoStatus::from_raw(0x10).has_error());
    }
}
