// Membrain: Capacitive Touch Driver
//
// Charge-time sensing on a bare GPIO. The pad is discharged by driving the
// pin low, then released into a pulled-up input; the number of polling
// iterations until it reads high grows with the pad's capacitance, i.e. when
// a finger is on it. A no-touch baseline is measured over a window spanning
// several mains cycles so powerline hum averages out.

use crate::board::{ChargePin, Clock, Exclusion};
use crate::config::CapacitiveConfig;

#[derive(Debug, thiserror::Error)]
pub enum CapacitiveError<E> {
    #[error("pin access failed: {0:?}")]
    Pin(E),
    #[error("calibration saturated, check wiring")]
    CalibrationTimeout,
    #[error("read saturated, check wiring")]
    ReadTimeout,
}

pub struct CapacitiveSensor<P, X, C> {
    pin: P,
    exclusion: X,
    clock: C,
    config: CapacitiveConfig,

    sample_count: u32,
    baseline_count: u32,
    last_calibrated_sample_count: u32,
    calibrated: bool,
    last_total: u32,

    raw_level: bool,
    previous_raw_level: bool,
}

impl<P, X, C> CapacitiveSensor<P, X, C>
where
    P: ChargePin,
    X: Exclusion,
    C: Clock,
{
    /// Inert until [`init`](Self::init) configures the pin.
    pub fn new(pin: P, exclusion: X, clock: C, config: CapacitiveConfig) -> Self {
        Self {
            pin,
            exclusion,
            clock,
            config,
            sample_count: 0,
            baseline_count: 0,
            last_calibrated_sample_count: 0,
            calibrated: false,
            last_total: 0,
            raw_level: false,
            previous_raw_level: false,
        }
    }

    /// Input with pull-up, `sample_count` charge cycles per read.
    pub fn init(&mut self, sample_count: u32) -> Result<(), CapacitiveError<P::Error>> {
        self.sample_count = sample_count;
        let pin = &mut self.pin;
        self.exclusion
            .exclusive(|| pin.set_input_pullup())
            .map_err(CapacitiveError::Pin)
    }

    /// Change the samples per read. The next read recalibrates.
    pub fn set_sample_count(&mut self, sample_count: u32) {
        if sample_count != self.sample_count {
            self.sample_count = sample_count;
            self.calibrated = false;
        }
    }

    /// Measure the no-touch baseline.
    ///
    /// Runs whole passes of `sample_count` cycles until the calibration
    /// window has elapsed (at least one pass). On saturation the baseline is
    /// left as it was and a wiring warning is logged. The sensor counts as
    /// calibrated for the current sample count either way; there is no
    /// automatic retry.
    pub fn calibrate(&mut self) -> Result<u32, CapacitiveError<P::Error>> {
        let result = self.run_calibration();
        self.calibrated = true;
        self.last_calibrated_sample_count = self.sample_count;

        match &result {
            Ok(baseline) => log::info!("Calibrated baselineCount = {}", baseline),
            Err(CapacitiveError::CalibrationTimeout) => {
                log::warn!("calibration over timeout, check wiring (baseline stays {})", self.baseline_count)
            }
            Err(e) => log::error!("calibration failed: {}", e),
        }
        result
    }

    fn run_calibration(&mut self) -> Result<u32, CapacitiveError<P::Error>> {
        let start = self.clock.now_ms();
        self.discharge()?;

        let mut total: u64 = 0;
        let mut passes: u32 = 0;
        loop {
            for _ in 0..self.sample_count {
                total += u64::from(self.charge_cycle(self.config.calibration_cycle_limit)?);
            }
            passes += 1;

            if self.clock.now_ms().wrapping_sub(start) >= self.config.calibration_window_ms {
                break;
            }
        }

        let saturated = u64::from(self.sample_count) * u64::from(self.config.saturation_per_sample) * u64::from(passes);
        if total >= saturated {
            return Err(CapacitiveError::CalibrationTimeout);
        }

        self.baseline_count = (total / u64::from(passes)) as u32;
        Ok(self.baseline_count)
    }

    /// Take one measurement pass and update the level.
    ///
    /// Calibrates first if that has never happened or the sample count
    /// changed. A saturated pass or a pin fault forces the level low.
    pub fn read(&mut self) -> bool {
        self.raw_level = match self.measure() {
            Ok(touched) => touched,
            Err(CapacitiveError::ReadTimeout) => {
                log::error!("read over timeout, check wiring (total {})", self.last_total);
                false
            }
            Err(e) => {
                log::error!("touch read failed: {}", e);
                false
            }
        };
        self.raw_level
    }

    fn measure(&mut self) -> Result<bool, CapacitiveError<P::Error>> {
        if !self.calibrated || self.sample_count != self.last_calibrated_sample_count {
            // Failure is already logged; carry on with whatever baseline we have.
            let _ = self.calibrate();
        }

        let mut total: u32 = 0;
        for _ in 0..self.sample_count {
            total = total.saturating_add(self.charge_cycle(self.config.read_cycle_limit)?);
        }
        self.last_total = total;

        if u64::from(total) >= u64::from(self.sample_count) * u64::from(self.config.saturation_per_sample) {
            return Err(CapacitiveError::ReadTimeout);
        }

        Ok(total.saturating_sub(self.baseline_count) > self.config.touch_threshold)
    }

    /// Rising edge of the touch level. Never true on a sustained touch.
    pub fn triggered(&mut self) -> bool {
        self.previous_raw_level = self.raw_level;
        let level = self.read();
        if level && !self.previous_raw_level {
            log::debug!("touch total = {}", self.last_total);
        }
        level && !self.previous_raw_level
    }

    /// Level from the most recent read, without measuring again.
    pub fn get_state(&self) -> bool {
        self.raw_level
    }

    pub fn baseline_count(&self) -> u32 {
        self.baseline_count
    }

    pub fn last_total(&self) -> u32 {
        self.last_total
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated && self.sample_count == self.last_calibrated_sample_count
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    // -----------------------------------------------------------------------
    // Pin choreography. Each direction change is its own short critical
    // section; the polling loop runs outside of it.
    // -----------------------------------------------------------------------

    fn discharge(&mut self) -> Result<(), CapacitiveError<P::Error>> {
        let pin = &mut self.pin;
        self.exclusion.exclusive(|| pin.set_output_low()).map_err(CapacitiveError::Pin)
    }

    fn charge_cycle(&mut self, limit: u32) -> Result<u32, CapacitiveError<P::Error>> {
        let pin = &mut self.pin;
        self.exclusion.exclusive(|| pin.set_input_pullup()).map_err(CapacitiveError::Pin)?;

        let mut iterations = 0;
        while iterations < limit {
            if self.pin.is_high().map_err(CapacitiveError::Pin)? {
                break;
            }
            iterations += 1;
        }

        self.discharge()?;
        Ok(iterations)
    }
}
