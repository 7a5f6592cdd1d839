//! Membrain sensor engine.
//!
//! Reads the instrument's touch pads, piezo, Hall-effect bend plate and
//! VL6180X distance sensor, and turns what it sees into MIDI events and
//! indicator commands. All hardware access goes through the traits in
//! [`board`], so everything here builds and tests on the host; the
//! ESP-IDF glue lives in the firmware binary.

pub mod board;
pub mod config;
pub mod drivers;
pub mod engine;
pub mod events;
pub mod stats;

#[cfg(test)]
mod testing;

pub use engine::{EngineError, EventEngine, Parts};
pub use events::{IndicatorCommand, MidiEvent};
