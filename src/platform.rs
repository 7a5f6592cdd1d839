// Membrain: ESP-IDF Board Glue
//
// Concrete implementations of the `membrain::board` seams on the
// Xiao ESP32-C3. Charge pins and the Hall converter go through raw
// `esp_idf_sys` calls; the charge loop flips direction thousands of times
// per pad and `PinDriver` cannot change mode in place.

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyInputPin, Input, PinDriver};
use esp_idf_hal::i2c::I2cDriver;
use esp_idf_sys::{esp, EspError};

use membrain::board::{Board, ChargePin, Clock, CriticalSectionExclusion};
use membrain::drivers::hall::HallInputs;

pub struct EspBoard;

impl Board for EspBoard {
    type ChargePin = EspChargePin;
    type ImpactPin = PinDriver<'static, AnyInputPin, Input>;
    type Bus = I2cDriver<'static>;
    type Delay = FreeRtos;
    type Hall = AdcHall;
    type Clock = EspClock;
    type Exclusion = CriticalSectionExclusion;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now_ms(&self) -> u32 {
        unsafe { (esp_idf_sys::esp_timer_get_time() / 1000) as u32 }
    }
}

// ---------------------------------------------------------------------------
// Charge pin
// ---------------------------------------------------------------------------
pub struct EspChargePin {
    gpio: i32,
}

impl EspChargePin {
    /// Takes a GPIO number from `config::PIN_TOUCH`. Nothing else may drive
    /// this pin afterwards.
    pub fn new(gpio: i32) -> Result<Self, EspError> {
        esp!(unsafe { esp_idf_sys::gpio_reset_pin(gpio) })?;
        Ok(Self { gpio })
    }
}

impl ChargePin for EspChargePin {
    type Error = EspError;

    fn set_input_pullup(&mut self) -> Result<(), EspError> {
        unsafe {
            esp!(esp_idf_sys::gpio_set_direction(
                self.gpio,
                esp_idf_sys::gpio_mode_t_GPIO_MODE_INPUT,
            ))?;
            esp!(esp_idf_sys::gpio_set_pull_mode(
                self.gpio,
                esp_idf_sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY,
            ))
        }
    }

    fn set_output_low(&mut self) -> Result<(), EspError> {
        unsafe {
            esp!(esp_idf_sys::gpio_set_direction(
                self.gpio,
                esp_idf_sys::gpio_mode_t_GPIO_MODE_OUTPUT,
            ))?;
            esp!(esp_idf_sys::gpio_set_level(self.gpio, 0))
        }
    }

    fn is_high(&mut self) -> Result<bool, EspError> {
        Ok(unsafe { esp_idf_sys::gpio_get_level(self.gpio) } != 0)
    }
}

// ---------------------------------------------------------------------------
// Hall inputs (ADC1 one-shot)
// ---------------------------------------------------------------------------
pub struct AdcHall {
    handle: esp_idf_sys::adc_oneshot_unit_handle_t,
    channels: [esp_idf_sys::adc_channel_t; 3],
}

// The unit handle is only ever used from the thread that owns the engine.
unsafe impl Send for AdcHall {}

impl AdcHall {
    /// On the C3, GPIO0..GPIO4 map straight onto ADC1 channels 0..4.
    pub fn new(pins: [i32; 3]) -> Result<Self, EspError> {
        let channels = pins.map(|p| p as esp_idf_sys::adc_channel_t);

        unsafe {
            let mut handle: esp_idf_sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
            let unit_cfg = esp_idf_sys::adc_oneshot_unit_init_cfg_t {
                unit_id: esp_idf_sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: esp_idf_sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            esp!(esp_idf_sys::adc_oneshot_new_unit(&unit_cfg, &mut handle))?;

            let chan_cfg = esp_idf_sys::adc_oneshot_chan_cfg_t {
                atten: esp_idf_sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: esp_idf_sys::adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            for &channel in &channels {
                esp!(esp_idf_sys::adc_oneshot_config_channel(handle, channel, &chan_cfg))?;
            }

            Ok(Self { handle, channels })
        }
    }
}

impl HallInputs for AdcHall {
    type Error = EspError;

    fn sample(&mut self) -> Result<[u16; 3], EspError> {
        let mut out = [0u16; 3];
        for (slot, &channel) in out.iter_mut().zip(&self.channels) {
            let mut raw: i32 = 0;
            esp!(unsafe { esp_idf_sys::adc_oneshot_read(self.handle, channel, &mut raw) })?;
            *slot = raw.clamp(0, 4095) as u16;
        }
        Ok(out)
    }
}
