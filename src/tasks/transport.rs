// Membrain: Transport Task
//
// Drains the engine's output channels. Host framing is handled elsewhere;
// here every MIDI message is logged as its encoded triple and indicator
// commands are logged as they arrive.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use membrain::config::TRANSPORT_POLL_INTERVAL_MS;
use membrain::events::{IndicatorCommand, MidiEvent};

pub fn transport_task(midi_rx: Receiver<MidiEvent>, indicator_rx: Receiver<IndicatorCommand>) {
    log::info!("Transport task started");

    let poll_interval = Duration::from_millis(TRANSPORT_POLL_INTERVAL_MS);

    loop {
        loop {
            match midi_rx.try_recv() {
                Ok(event) => {
                    let [status, data1, data2] = event.to_bytes();
                    log::info!("MIDI {:02X} {:02X} {:02X}", status, data1, data2);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("MIDI channel closed, exiting transport task");
                    return;
                }
            }
        }

        while let Ok(command) = indicator_rx.try_recv() {
            log::debug!("indicator {:?}", command);
        }

        thread::sleep(poll_interval);
    }
}
