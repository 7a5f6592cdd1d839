// Membrain: Firmware Entry Point
//
// Boot sequence:
//   1. Bring up logging and take the peripherals.
//   2. Open the I2C bus and the VL6180X (the instrument still plays without it).
//   3. Claim the touch, piezo and Hall inputs.
//   4. Build the engine and calibrate every pad.
//   5. Spawn the MIDI engine and transport tasks.

#[cfg(target_os = "espidf")]
mod platform;
#[cfg(target_os = "espidf")]
mod tasks;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::gpio::{AnyInputPin, Input, InputPin, PinDriver, Pull};
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;

    use membrain::board::CriticalSectionExclusion;
    use membrain::config::*;
    use membrain::drivers::range::RangeSensor;
    use membrain::events::{IndicatorCommand, Pixel, DIM_GREEN};
    use membrain::{EventEngine, Parts};

    use crate::platform::{AdcHall, EspBoard, EspChargePin, EspClock};

    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("Membrain firmware starting...");

    let config = EngineConfig::default();

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;

    // ---- I2C bus (VL6180X only) --------------------------------------------
    let i2c_config = I2cConfig::new().baudrate(I2C_BAUDRATE_KHZ.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6, // SDA
        peripherals.pins.gpio7, // SCL
        &i2c_config,
    )?;

    let mut range = RangeSensor::new(i2c, FreeRtos, config.range);
    let range = match range.init() {
        Ok(()) => Some(range),
        Err(e) => {
            log::error!("VL6180X init failed, continuing without distance control: {}", e);
            None
        }
    };

    // ---- Inputs -------------------------------------------------------------
    let touch_pins = PIN_TOUCH
        .iter()
        .map(|&gpio| EspChargePin::new(gpio))
        .collect::<Result<Vec<_>, _>>()?;

    // No internal pulls on the piezo pin; the board has an external pull-down.
    let mut piezo: PinDriver<'static, AnyInputPin, Input> =
        PinDriver::input(peripherals.pins.gpio20.downgrade_input())?;
    piezo.set_pull(Pull::Floating)?;

    let hall = AdcHall::new(PIN_HALL)?;

    // ---- Engine -------------------------------------------------------------
    let parts = Parts::<EspBoard> {
        touch_pins,
        impact_pin: piezo,
        hall,
        range,
        clock: EspClock,
        exclusion: CriticalSectionExclusion,
    };
    let mut engine = EventEngine::new(config, parts)?;

    let calibrated = engine.calibrate_all();
    log::info!("{} of {} pads calibrated", calibrated, PIN_TOUCH.len());

    // ---- Channels ---------------------------------------------------------
    let (midi_tx, midi_rx) = mpsc::channel();
    let (indicator_tx, indicator_rx) = mpsc::channel();

    if indicator_tx
        .send(IndicatorCommand::Solid { pixel: Pixel::Power, color: DIM_GREEN })
        .is_err()
    {
        log::warn!("indicator channel closed before start");
    }

    // ---- Spawn tasks (map to FreeRTOS tasks via std::thread) ---------------
    thread::Builder::new()
        .name("transport".into())
        .stack_size(STACK_TRANSPORT)
        .spawn(move || {
            tasks::transport::transport_task(midi_rx, indicator_rx);
        })?;

    thread::Builder::new()
        .name("midi".into())
        .stack_size(STACK_MIDI)
        .spawn(move || {
            tasks::midi::midi_task(engine, midi_tx, indicator_tx);
        })?;

    log::info!("Boot complete, entering normal operation");

    // Main thread has nothing left to do; park it forever.
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("membrain firmware only runs on ESP-IDF targets; run `cargo test` for the host build");
}
