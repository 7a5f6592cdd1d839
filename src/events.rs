// Membrain: MIDI Events & Indicator Commands

use std::sync::mpsc::Sender;

// ---------------------------------------------------------------------------
// Colors (GRB words, as the LED strip expects them)
// ---------------------------------------------------------------------------
pub const OFF: u32 = 0x000000;
pub const DIM_GREEN: u32 = 0x250000;
pub const DIM_BLUE: u32 = 0x000025;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const CONTROL_CHANGE: u8 = 0xB1;
const PITCH_BEND: u8 = 0xE0;

pub const PITCH_BEND_CENTER: u16 = 8192;
pub const PITCH_BEND_MAX: u16 = 16383;

// ---------------------------------------------------------------------------
// MIDI events
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { number: u8, value: u8 },
    /// 14-bit value, 8192 is centered.
    PitchBend { value: u16 },
}

impl MidiEvent {
    /// Encode as the three bytes handed to the transport.
    pub fn to_bytes(self) -> [u8; 3] {
        match self {
            Self::NoteOn { note, velocity } => [NOTE_ON, note & 0x7F, velocity & 0x7F],
            Self::NoteOff { note } => [NOTE_OFF, note & 0x7F, 0],
            Self::ControlChange { number, value } => [CONTROL_CHANGE, number & 0x7F, value & 0x7F],
            Self::PitchBend { value } => [PITCH_BEND, (value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8],
        }
    }
}

// ---------------------------------------------------------------------------
// Indicator LEDs
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pixel {
    Power = 0,
    Usb = 1,
    Midi = 2,
    Pixel3 = 3,
    Pixel4 = 4,
    Pixel5 = 5,
    Pixel6 = 6,
    Pixel7 = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCommand {
    /// Hold a steady color (`OFF` switches the pixel off).
    Solid { pixel: Pixel, color: u32 },
    /// Blink `repeat` more times with a period of `period` LED frames.
    Blink { pixel: Pixel, color: u32, period: u32, repeat: i32 },
}

// ---------------------------------------------------------------------------
// Sinks for the external collaborators
// ---------------------------------------------------------------------------

/// Receives MIDI events in generation order. Must not block the engine.
pub trait MidiSink {
    fn send(&mut self, event: MidiEvent);
}

/// Receives indicator commands keyed to edge transitions.
pub trait IndicatorSink {
    fn apply(&mut self, command: IndicatorCommand);
}

impl MidiSink for Vec<MidiEvent> {
    fn send(&mut self, event: MidiEvent) {
        self.push(event);
    }
}

impl IndicatorSink for Vec<IndicatorCommand> {
    fn apply(&mut self, command: IndicatorCommand) {
        self.push(command);
    }
}

impl MidiSink for Sender<MidiEvent> {
    fn send(&mut self, event: MidiEvent) {
        // A dropped receiver means the transport is gone; the engine keeps
        // sampling so the indicator path still works.
        if Sender::send(self, event).is_err() {
            log::warn!("MIDI channel closed, dropping {:?}", event);
        }
    }
}

impl IndicatorSink for Sender<IndicatorCommand> {
    fn apply(&mut self, command: IndicatorCommand) {
        if Sender::send(self, command).is_err() {
            log::warn!("indicator channel closed, dropping {:?}", command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(MidiEvent::NoteOn { note: 37, velocity: 127 }, [0x90, 37, 127])]
    #[case(MidiEvent::NoteOff { note: 36 }, [0x80, 36, 0])]
    #[case(MidiEvent::ControlChange { number: 21, value: 64 }, [0xB1, 21, 64])]
    #[case(MidiEvent::PitchBend { value: 8192 }, [0xE0, 0x00, 0x40])]
    #[case(MidiEvent::PitchBend { value: 16383 }, [0xE0, 0x7F, 0x7F])]
    #[case(MidiEvent::PitchBend { value: 12000 }, [0xE0, (12000 & 0x7F) as u8, (12000 >> 7) as u8])]
    fn encodes_wire_triples(#[case] event: MidiEvent, #[case] bytes: [u8; 3]) {
        assert_eq!(event.to_bytes(), bytes);
    }

    #[test]
    fn channel_sink_survives_closed_receiver() {
        let (mut tx, rx) = std::sync::mpsc::channel::<MidiEvent>();
        drop(rx);
        MidiSink::send(&mut tx, MidiEvent::NoteOff { note: 1 });
    }

    #[test]
    fn indicator_sink_survives_closed_receiver() {
        let (mut tx, rx) = std::sync::mpsc::channel::<IndicatorCommand>();
        tx.apply(IndicatorCommand::Solid { pixel: Pixel::Pixel3, color: DIM_BLUE });
        assert_eq!(rx.try_recv().ok(), Some(IndicatorCommand::Solid { pixel: Pixel::Pixel3, color: DIM_BLUE }));

        drop(rx);
        tx.apply(IndicatorCommand::Solid { pixel: Pixel::Pixel3, color: OFF });
    }
}
