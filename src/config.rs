// Membrain: Hardware & Engine Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V)
//
// The constants below are the board defaults. The engine never reads them
// directly; they seed an `EngineConfig` that is handed over at construction.

use crate::events::{Pixel, DIM_BLUE};

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_TOUCH: [i32; 4] = [5, 8, 9, 10]; // D3, D8, D9, D10: touch pads
pub const PIN_PIEZO: i32 = 20;                  // D7:    piezo comparator (external pull-down)
pub const PIN_HALL: [i32; 3] = [2, 3, 4];       // D0-D2: Hall sensors (ADC1 ch 2..4)
pub const PIN_I2C_SDA: i32 = 6;                 // D4:    I2C data line
pub const PIN_I2C_SCL: i32 = 7;                 // D5:    I2C clock line

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_VL6180X: u8 = 0x29;
pub const I2C_BAUDRATE_KHZ: u32 = 100;

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_MIDI: usize = 8192;
pub const STACK_TRANSPORT: usize = 4096;

// ---------------------------------------------------------------------------
// Task timing
// ---------------------------------------------------------------------------
pub const TRANSPORT_POLL_INTERVAL_MS: u64 = 5;

// ---------------------------------------------------------------------------
// Capacitive sensing
// ---------------------------------------------------------------------------
pub const TOUCH_THRESHOLD: u32 = 50_000;
pub const TOUCH_SAMPLE_COUNT: u32 = 2000;
pub const CALIBRATION_WINDOW_MS: u32 = 166;  // ~10 mains cycles at 60 Hz
pub const CALIBRATION_CYCLE_LIMIT: u32 = 500;
pub const READ_CYCLE_LIMIT: u32 = 5000;
pub const SATURATION_PER_SAMPLE: u32 = 450;

// ---------------------------------------------------------------------------
// Piezo
// ---------------------------------------------------------------------------
pub const PIEZO_DEBOUNCE_MS: u32 = 10;
pub const PIEZO_GATE_MS: u32 = 10;
pub const PIEZO_NOTE: u8 = 36;

// ---------------------------------------------------------------------------
// Hall-effect pitch bend
// ---------------------------------------------------------------------------
pub const HALL_ADC_MIDPOINT: f32 = 2048.0;   // 12-bit converter
pub const HALL_A1: f32 = 0.80;
pub const HALL_HYSTERESIS: f32 = 0.01;
pub const HALL_DEADZONE: f32 = 0.08;

// ---------------------------------------------------------------------------
// VL6180X distance sensor
// ---------------------------------------------------------------------------
pub const RANGE_A1: f32 = 0.50;
pub const RANGE_MIN: f32 = 5.0;
pub const RANGE_MAX: f32 = 17.0;
pub const RANGE_INTERVAL_MS: u32 = 100;
pub const RANGE_POLL_LIMIT: u8 = 10;
pub const RANGE_POLL_SPACING_MS: u32 = 1;
pub const RANGE_CC: u8 = 21;

// ---------------------------------------------------------------------------
// Note bindings
// ---------------------------------------------------------------------------
pub const START_NOTE: u8 = 37;
pub const TOGGLE_CC: u8 = 20;
pub const VELOCITY: u8 = 127;

// ---------------------------------------------------------------------------
// Loop statistics
// ---------------------------------------------------------------------------
pub const TICK_STATS_WINDOW: u32 = 1000;

/// What a touch pad produces when it is pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// NoteOn on press, NoteOff on release.
    Note(u8),
    /// ControlChange 127 on press, 0 on release.
    ControlToggle(u8),
}

/// One row of the static binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingConfig {
    pub id: u8,
    pub kind: BindingKind,
    pub pixel: Pixel,
    pub sample_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacitiveConfig {
    pub touch_threshold: u32,
    pub calibration_window_ms: u32,
    pub calibration_cycle_limit: u32,
    pub read_cycle_limit: u32,
    pub saturation_per_sample: u32,
}

impl Default for CapacitiveConfig {
    fn default() -> Self {
        Self {
            touch_threshold: TOUCH_THRESHOLD,
            calibration_window_ms: CALIBRATION_WINDOW_MS,
            calibration_cycle_limit: CALIBRATION_CYCLE_LIMIT,
            read_cycle_limit: READ_CYCLE_LIMIT,
            saturation_per_sample: SATURATION_PER_SAMPLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeConfig {
    pub a1: f32,
    pub min: f32,
    pub max: f32,
    pub interval_ms: u32,
    pub poll_limit: u8,
    pub poll_spacing_ms: u32,
    pub cc: u8,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            a1: RANGE_A1,
            min: RANGE_MIN,
            max: RANGE_MAX,
            interval_ms: RANGE_INTERVAL_MS,
            poll_limit: RANGE_POLL_LIMIT,
            poll_spacing_ms: RANGE_POLL_SPACING_MS,
            cc: RANGE_CC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HallConfig {
    pub midpoint: f32,
    pub a1: f32,
    pub hysteresis: f32,
    pub deadzone: f32,
}

impl Default for HallConfig {
    fn default() -> Self {
        Self {
            midpoint: HALL_ADC_MIDPOINT,
            a1: HALL_A1,
            hysteresis: HALL_HYSTERESIS,
            deadzone: HALL_DEADZONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiezoConfig {
    pub debounce_ms: u32,
    pub gate_ms: u32,
    pub note: u8,
    pub pixel: Pixel,
    pub blink_color: u32,
    pub blink_period: u32,
    pub blink_repeat: i32,
}

impl Default for PiezoConfig {
    fn default() -> Self {
        Self {
            debounce_ms: PIEZO_DEBOUNCE_MS,
            gate_ms: PIEZO_GATE_MS,
            note: PIEZO_NOTE,
            pixel: Pixel::Midi,
            blink_color: DIM_BLUE,
            blink_period: 10,
            blink_repeat: 1,
        }
    }
}

/// Everything the engine needs to know at startup. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub capacitive: CapacitiveConfig,
    pub piezo: PiezoConfig,
    pub hall: HallConfig,
    pub range: RangeConfig,
    pub bindings: Vec<BindingConfig>,
    pub velocity: u8,
    pub touch_color: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let pixels = [Pixel::Pixel3, Pixel::Pixel4, Pixel::Pixel5, Pixel::Pixel6];
        let bindings = pixels
            .iter()
            .enumerate()
            .map(|(i, &pixel)| BindingConfig {
                id: i as u8,
                // The last pad is wired as a sustain-style toggle.
                kind: if i == pixels.len() - 1 {
                    BindingKind::ControlToggle(TOGGLE_CC)
                } else {
                    BindingKind::Note(START_NOTE + i as u8)
                },
                pixel,
                sample_count: TOUCH_SAMPLE_COUNT,
            })
            .collect();

        Self {
            capacitive: CapacitiveConfig::default(),
            piezo: PiezoConfig::default(),
            hall: HallConfig::default(),
            range: RangeConfig::default(),
            bindings,
            velocity: VELOCITY,
            touch_color: DIM_BLUE,
        }
    }
}
