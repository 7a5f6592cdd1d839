// Membrain: VL6180X Time-of-Flight Driver
//
// Register-level driver over I2C. Every access is a 16-bit big-endian
// register address followed, in the same transaction, by one data byte read
// or written. Readings are smoothed with a one-pole IIR filter.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::config::{RangeConfig, I2C_ADDR_VL6180X};

// VL6180X register addresses
pub const REG_IDENTIFICATION_MODEL_ID: u16 = 0x000;
pub const REG_SYSTEM_INTERRUPT_CONFIG: u16 = 0x014;
pub const REG_SYSTEM_INTERRUPT_CLEAR: u16 = 0x015;
pub const REG_SYSTEM_FRESH_OUT_OF_RESET: u16 = 0x016;
pub const REG_SYSRANGE_START: u16 = 0x018;
pub const REG_SYSRANGE_INTERMEASUREMENT_PERIOD: u16 = 0x01B;
pub const REG_SYSRANGE_PART_TO_PART_RANGE_OFFSET: u16 = 0x024;
pub const REG_SYSALS_START: u16 = 0x038;
pub const REG_SYSALS_ANALOGUE_GAIN: u16 = 0x03F;
pub const REG_SYSALS_INTEGRATION_PERIOD_HI: u16 = 0x040;
pub const REG_SYSALS_INTEGRATION_PERIOD_LO: u16 = 0x041;
pub const REG_RESULT_RANGE_STATUS: u16 = 0x04D;
pub const REG_RESULT_INTERRUPT_STATUS_GPIO: u16 = 0x04F;
pub const REG_RESULT_ALS_VAL: u16 = 0x050;
pub const REG_RESULT_RANGE_VAL: u16 = 0x062;

const RANGE_STATUS_DEVICE_READY: u8 = 0x01;
const INTERRUPT_NEW_SAMPLE_READY: u8 = 0x04;
const RANGE_START_SINGLE_SHOT: u8 = 0x01;
const INTERRUPT_CLEAR_ALL: u8 = 0x07;

/// Fresh-out-of-reset tuning: private registers from the ST application note
/// (AN4545 p. 24), then the recommended public settings.
pub const RESET_SETTINGS: [(u16, u8); 39] = [
    (0x0207, 0x01),
    (0x0208, 0x01),
    (0x0096, 0x00),
    (0x0097, 0xfd),
    (0x00e3, 0x00),
    (0x00e4, 0x04),
    (0x00e5, 0x02),
    (0x00e6, 0x01),
    (0x00e7, 0x03),
    (0x00f5, 0x02),
    (0x00d9, 0x05),
    (0x00db, 0xce),
    (0x00dc, 0x03),
    (0x00dd, 0xf8),
    (0x009f, 0x00),
    (0x00a3, 0x3c),
    (0x00b7, 0x00),
    (0x00bb, 0x3c),
    (0x00b2, 0x09),
    (0x00ca, 0x09),
    (0x0198, 0x01),
    (0x01b0, 0x17),
    (0x01ad, 0x00),
    (0x00ff, 0x05),
    (0x0100, 0x05),
    (0x0199, 0x05),
    (0x01a6, 0x1b),
    (0x01ac, 0x3e),
    (0x01a7, 0x1f),
    (0x0030, 0x00),
    // Poll for 'new sample ready' when a measurement completes
    (0x0011, 0x10),
    // Averaging sample period
    (0x010a, 0x30),
    // ALS light and dark gain (dark gain must not change)
    (REG_SYSALS_ANALOGUE_GAIN, 0x46),
    // Range measurements between auto calibrations
    (0x0031, 0xFF),
    // ALS integration time 100 ms
    (REG_SYSALS_INTEGRATION_PERIOD_LO, 0x63),
    // One-shot temperature calibration of the ranging sensor
    (0x002e, 0x01),
    // Ranging inter-measurement period 100 ms
    (REG_SYSRANGE_INTERMEASUREMENT_PERIOD, 0x0A),
    // ALS inter-measurement period 500 ms
    (0x003e, 0x31),
    // Interrupt on 'new sample ready'
    (REG_SYSTEM_INTERRUPT_CONFIG, 0x24),
];

#[derive(Debug, thiserror::Error)]
pub enum RangeError<E> {
    #[error("I2C transfer failed: {0:?}")]
    Bus(E),
    #[error("VL6180X not found: {0:?}")]
    NotFound(E),
    #[error("range status not ready")]
    NotReady,
    #[error("range poll timeout")]
    Timeout,
}

/// Range-quality code from the upper nibble of `RESULT_RANGE_STATUS`.
/// Informational: the reading that comes with it is still used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeAdvisory {
    SystemError(u8),
    EarlyConvergenceFail,
    NoConvergence,
    RangeIgnore,
    Snr,
    RawUnderflow,
    RawOverflow,
    RangeUnderflow,
    RangeOverflow,
    Other(u8),
}

impl RangeAdvisory {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => return None,
            1 | 5 => Self::SystemError(code),
            6 => Self::EarlyConvergenceFail,
            7 => Self::NoConvergence,
            8 => Self::RangeIgnore,
            11 => Self::Snr,
            12 => Self::RawUnderflow,
            13 => Self::RawOverflow,
            14 => Self::RangeUnderflow,
            15 => Self::RangeOverflow,
            _ => Self::Other(code),
        })
    }
}

pub struct RangeSensor<I, D> {
    i2c: I,
    delay: D,
    config: RangeConfig,
    previous_filtered: f32,
    last_raw_range: u8,
    last_advisory: Option<RangeAdvisory>,
}

impl<I, E, D> RangeSensor<I, D>
where
    I: I2c<SevenBitAddress, Error = E>,
    E: core::fmt::Debug,
    D: DelayNs,
{
    pub fn new(i2c: I, delay: D, config: RangeConfig) -> Self {
        Self {
            i2c,
            delay,
            config,
            previous_filtered: 0.0,
            last_raw_range: 0,
            last_advisory: None,
        }
    }

    /// Confirm the device answers and, if it has just come out of reset,
    /// load the tuning table once and clear the flag.
    pub fn init(&mut self) -> Result<(), RangeError<E>> {
        let model = self.read_byte(REG_IDENTIFICATION_MODEL_ID).map_err(|e| match e {
            RangeError::Bus(source) => RangeError::NotFound(source),
            other => other,
        })?;
        log::info!("VL6180X model ID: 0x{:02x}", model);

        let fresh = self.read_byte(REG_SYSTEM_FRESH_OUT_OF_RESET).map_err(|e| {
            log::error!("Failed to read fresh out of reset: {}", e);
            e
        })?;

        if fresh == 1 {
            log::info!("VL6180X fresh out of reset");
            self.load_settings()?;
            self.write_byte(REG_SYSTEM_FRESH_OUT_OF_RESET, 0x00).map_err(|e| {
                log::error!("Failed to write fresh out of reset: {}", e);
                e
            })?;
        }
        Ok(())
    }

    fn load_settings(&mut self) -> Result<(), RangeError<E>> {
        for &(reg, value) in RESET_SETTINGS.iter() {
            self.write_byte(reg, value)?;
        }
        Ok(())
    }

    /// Filtered distance, or `0.0` when no reading could be taken.
    pub fn read_range(&mut self) -> f32 {
        self.try_read_range().unwrap_or_else(|e| {
            log::error!("{}", e);
            0.0
        })
    }

    /// Single-shot measurement, smoothed.
    ///
    /// Failures leave the filter state untouched, so the next good reading
    /// continues from the last good one.
    pub fn try_read_range(&mut self) -> Result<f32, RangeError<E>> {
        let status = self.read_byte(REG_RESULT_RANGE_STATUS)?;
        if status & RANGE_STATUS_DEVICE_READY == 0 {
            return Err(RangeError::NotReady);
        }

        self.write_byte(REG_SYSRANGE_START, RANGE_START_SINGLE_SHOT)?;
        self.wait_for_sample()?;

        let raw = self.read_byte(REG_RESULT_RANGE_VAL)?;
        self.clear_interrupts()?;

        let code = self.read_byte(REG_RESULT_RANGE_STATUS)? >> 4;
        self.last_advisory = RangeAdvisory::from_code(code);
        if let Some(advisory) = self.last_advisory {
            log::warn!("Range status: {} ({:?})", code, advisory);
        }

        self.last_raw_range = raw;
        let a1 = self.config.a1;
        self.previous_filtered = (1.0 - a1.abs()) * f32::from(raw) + a1 * self.previous_filtered;
        Ok(self.previous_filtered)
    }

    fn wait_for_sample(&mut self) -> Result<(), RangeError<E>> {
        let limit = self.config.poll_limit;
        for attempt in 1..=limit {
            if self.read_byte(REG_RESULT_INTERRUPT_STATUS_GPIO)? & INTERRUPT_NEW_SAMPLE_READY != 0 {
                return Ok(());
            }
            if attempt < limit {
                self.delay.delay_ms(self.config.poll_spacing_ms);
            }
        }
        Err(RangeError::Timeout)
    }

    fn clear_interrupts(&mut self) -> Result<(), RangeError<E>> {
        self.write_byte(REG_SYSTEM_INTERRUPT_CLEAR, INTERRUPT_CLEAR_ALL)
    }

    pub fn last_raw_range(&self) -> u8 {
        self.last_raw_range
    }

    pub fn last_advisory(&self) -> Option<RangeAdvisory> {
        self.last_advisory
    }

    pub fn filtered(&self) -> f32 {
        self.previous_filtered
    }

    // Raw register access

    fn read_byte(&mut self, reg: u16) -> Result<u8, RangeError<E>> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(I2C_ADDR_VL6180X, &reg.to_be_bytes(), &mut buf)
            .map_err(RangeError::Bus)?;
        Ok(buf[0])
    }

    fn write_byte(&mut self, reg: u16, value: u8) -> Result<(), RangeError<E>> {
        let [hi, lo] = reg.to_be_bytes();
        self.i2c.write(I2C_ADDR_VL6180X, &[hi, lo, value]).map_err(RangeError::Bus)
    }
}
