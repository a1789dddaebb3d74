//! Register map and SPI word framing for the BGT60TRxx family.
//!
//! Every SPI exchange moves a 32-bit big-endian word: a 7-bit register
//! address at bit 25, a read/write flag at bit 24, and a 24-bit payload.
//! Burst mode replaces the address byte with the 0xFF burst command.

// Single-word access framing.
pub const SPI_REGADR_POS: u32 = 25;
pub const SPI_REGADR_MSK: u32 = 0xFE00_0000;
pub const SPI_WR_OP_MSK: u32 = 0x0100_0000;
pub const SPI_DATA_POS: u32 = 0;
pub const SPI_DATA_MSK: u32 = 0x00FF_FFFF;

// Burst-mode command framing.
pub const SPI_BURST_MODE_CMD: u32 = 0xFF00_0000;
pub const SPI_BURST_MODE_SADR_POS: u32 = 17;
pub const SPI_BURST_MODE_SADR_MSK: u32 = 0x00FE_0000;
pub const SPI_BURST_MODE_RWB_MSK: u32 = 0x0001_0000;
pub const SPI_BURST_MODE_LEN_POS: u32 = 9;
pub const SPI_BURST_MODE_LEN_MSK: u32 = 0x0000_FE00;

/// Bytes occupied by the burst-mode command word on the wire.
pub const SPI_BURST_HEADER_SIZE_BYTES: usize = 4;
/// One FIFO word carries two 12-bit ADC samples.
pub const NUM_SAMPLES_FIFO_WORD: usize = 2;
/// Size of one packed FIFO word.
pub const FIFO_WORD_SIZE_BYTES: usize = 3;
/// Seed of the built-in FIFO test-pattern LFSR.
pub const INITIAL_TEST_WORD: u16 = 0x0001;

// Register addresses common to the family.
pub const REG_MAIN: u32 = 0x00;
pub const REG_CHIP_ID: u32 = 0x02;
pub const REG_STAT1: u32 = 0x03;
pub const REG_SFCTL: u32 = 0x06;

// MAIN register bits.
pub const REG_MAIN_FRAME_START_MSK: u32 = 0x0000_0001;
pub const REG_MAIN_SW_RESET_MSK: u32 = 0x0000_0002;
pub const REG_MAIN_FSM_RESET_MSK: u32 = 0x0000_0004;
pub const REG_MAIN_FIFO_RESET_MSK: u32 = 0x0000_0008;

// CHIP_ID register fields.
pub const REG_CHIP_ID_DIGITAL_ID_POS: u32 = 16;
pub const REG_CHIP_ID_DIGITAL_ID_MSK: u32 = 0x00FF_0000;
pub const REG_CHIP_ID_RF_ID_POS: u32 = 8;
pub const REG_CHIP_ID_RF_ID_MSK: u32 = 0x0000_FF00;

// SFCTL register fields.
pub const REG_SFCTL_FIFO_CREF_POS: u32 = 0;
pub const REG_SFCTL_FIFO_CREF_MSK: u32 = 0x0000_1FFF;
pub const REG_SFCTL_MISO_HS_READ_MSK: u32 = 0x0001_0000;
pub const REG_SFCTL_LFSR_EN_MSK: u32 = 0x0002_0000;
pub const REG_SFCTL_PREFIX_EN_MSK: u32 = 0x0004_0000;
pub const REG_SFCTL_FIFO_LP_MODE_MSK: u32 = 0x0008_0000;

// FSTAT register fields (per-device address, common layout).
pub const REG_FSTAT_FILL_STATUS_POS: u32 = 0;
pub const REG_FSTAT_FILL_STATUS_MSK: u32 = 0x0000_3FFF;
pub const REG_FSTAT_CLK_NUM_ERR_MSK: u32 = 0x0002_0000;
pub const REG_FSTAT_SPI_BURST_ERR_MSK: u32 = 0x0004_0000;
pub const REG_FSTAT_FUF_ERR_MSK: u32 = 0x0008_0000;
pub const REG_FSTAT_EMPTY_MSK: u32 = 0x0010_0000;
pub const REG_FSTAT_CREF_MSK: u32 = 0x0020_0000;
pub const REG_FSTAT_FULL_MSK: u32 = 0x0040_0000;
pub const REG_FSTAT_FOF_ERR_MSK: u32 = 0x0080_0000;

// GSR0 status byte, clocked out first on every transfer.
pub const REG_GSR0_FOU_ERR_MSK: u8 = 0x08;
pub const REG_GSR0_MISO_HS_READ_MSK: u8 = 0x04;
pub const REG_GSR0_SPI_BURST_ERR_MSK: u8 = 0x02;
pub const REG_GSR0_CLK_NUM_ERR_MSK: u8 = 0x01;

/// GSR0 bits that indicate a corrupted transfer.
pub const REG_GSR0_ERR_MSK: u8 =
    REG_GSR0_FOU_ERR_MSK | REG_GSR0_SPI_BURST_ERR_MSK | REG_GSR0_CLK_NUM_ERR_MSK;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_framing_constants() {
        assert_eq!(NUM_SAMPLES_FIFO_WORD, 2);
        assert_eq!(FIFO_WORD_SIZE_BYTES, 3);
        assert_eq!(SPI_BURST_HEADER_SIZE_BYTES, 4);
        assert_eq!(INITIAL_TEST_WORD, 0x0001);
    }

    #[test]
    fn field_masks_sit_at_their_positions() {
        assert_eq!(SPI_REGADR_MSK >> SPI_REGADR_POS, 0x7F);
        assert_eq!(SPI_BURST_MODE_SADR_MSK >> SPI_BURST_MODE_SADR_POS, 0x7F);
        assert_eq!(SPI_BURST_MODE_LEN_MSK >> SPI_BURST_MODE_LEN_POS, 0x7F);
        assert_eq!(REG_CHIP_ID_DIGITAL_ID_MSK >> REG_CHIP_ID_DIGITAL_ID_POS, 0xFF);
        assert_eq!(REG_CHIP_ID_RF_ID_MSK >> REG_CHIP_ID_RF_ID_POS, 0xFF);
    }
}
