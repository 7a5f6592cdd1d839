// Membrain: MIDI Engine Task
//
// Owns the engine and runs it flat out. Each tick is timed and a summary is
// logged once per statistics window.

use std::sync::mpsc::Sender;

use esp_idf_hal::delay::FreeRtos;

use membrain::board::Clock;
use membrain::config::TICK_STATS_WINDOW;
use membrain::events::{IndicatorCommand, MidiEvent};
use membrain::stats::TickStats;
use membrain::EventEngine;

use crate::platform::{EspBoard, EspClock};

pub fn midi_task(
    mut engine: EventEngine<EspBoard>,
    mut midi_tx: Sender<MidiEvent>,
    mut indicator_tx: Sender<IndicatorCommand>,
) {
    log::info!("MIDI task started");

    let clock = EspClock;
    let mut stats = TickStats::new(TICK_STATS_WINDOW);

    loop {
        let start = clock.now_ms();
        engine.tick(&mut midi_tx, &mut indicator_tx);

        if let Some(summary) = stats.record(clock.now_ms().wrapping_sub(start)) {
            log::info!(
                "tick min {} ms / max {} ms / avg {} ms over {} ticks",
                summary.min_ms,
                summary.max_ms,
                summary.avg_ms,
                summary.samples
            );
        }

        // Give the idle task one scheduler tick so the task watchdog stays fed.
        FreeRtos::delay_ms(1);
    }
}
