// Membrain: Event Engine
//
// One `tick` samples every sensor once and turns transitions into MIDI
// events. The evaluation order is fixed (pitch bend, piezo, touch pads in
// table order, distance) and events leave in exactly the order they were
// generated.

use crate::board::{Board, Clock};
use crate::config::{BindingKind, EngineConfig};
use crate::drivers::capacitive::CapacitiveSensor;
use crate::drivers::hall::{HallInputs, PositionFilter};
use crate::drivers::impact::ImpactSensor;
use crate::drivers::range::RangeSensor;
use crate::events::{IndicatorCommand, IndicatorSink, MidiEvent, MidiSink, Pixel, OFF};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("binding table has {expected} pads but {found} pins were supplied")]
    PinCount { expected: usize, found: usize },
    #[error("binding id {0} appears twice")]
    DuplicateId(u8),
    #[error("touch pin for binding {id} failed to initialize")]
    PinInit {
        id: u8,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A touch pad and what it plays.
pub struct NoteBinding<P, X, C> {
    id: u8,
    sensor: CapacitiveSensor<P, X, C>,
    kind: BindingKind,
    pixel: Pixel,
    active: bool,
}

impl<P, X, C> NoteBinding<P, X, C> {
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn pixel(&self) -> Pixel {
        self.pixel
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn press_event(&self, velocity: u8) -> MidiEvent {
        match self.kind {
            BindingKind::Note(note) => MidiEvent::NoteOn { note, velocity },
            BindingKind::ControlToggle(number) => MidiEvent::ControlChange { number, value: 127 },
        }
    }

    fn release_event(&self) -> MidiEvent {
        match self.kind {
            BindingKind::Note(note) => MidiEvent::NoteOff { note },
            BindingKind::ControlToggle(number) => MidiEvent::ControlChange { number, value: 0 },
        }
    }
}

/// Peripherals the engine takes ownership of.
pub struct Parts<B: Board> {
    /// One per `EngineConfig::bindings` entry, same order.
    pub touch_pins: Vec<B::ChargePin>,
    pub impact_pin: B::ImpactPin,
    pub hall: B::Hall,
    /// `None` when the distance sensor failed to come up and the caller chose
    /// to run without it.
    pub range: Option<RangeSensor<B::Bus, B::Delay>>,
    pub clock: B::Clock,
    pub exclusion: B::Exclusion,
}

pub type Binding<B> = NoteBinding<<B as Board>::ChargePin, <B as Board>::Exclusion, <B as Board>::Clock>;

pub struct EventEngine<B: Board> {
    config: EngineConfig,
    clock: B::Clock,

    bindings: Box<[Binding<B>]>,

    impact: ImpactSensor<B::ImpactPin, B::Clock>,
    impact_note_open: bool,
    impact_opened_at: u32,

    hall: B::Hall,
    position: PositionFilter,

    range: Option<RangeSensor<B::Bus, B::Delay>>,
    range_last_run: Option<u32>,
    range_last_cc: Option<u8>,
}

/// Counts what we hand to the transport during one tick.
struct Emitter<'a, M> {
    sink: &'a mut M,
    sent: usize,
}

impl<M: MidiSink> Emitter<'_, M> {
    fn emit(&mut self, event: MidiEvent) {
        log::debug!("midi {:02x?}", event.to_bytes());
        self.sink.send(event);
        self.sent += 1;
    }
}

impl<B: Board> EventEngine<B> {
    /// Build the binding registry. It is never resized afterwards.
    pub fn new(config: EngineConfig, parts: Parts<B>) -> Result<Self, EngineError> {
        let Parts { touch_pins, impact_pin, hall, range, clock, exclusion } = parts;

        if touch_pins.len() != config.bindings.len() {
            return Err(EngineError::PinCount {
                expected: config.bindings.len(),
                found: touch_pins.len(),
            });
        }
        for (i, binding) in config.bindings.iter().enumerate() {
            if config.bindings[..i].iter().any(|b| b.id == binding.id) {
                return Err(EngineError::DuplicateId(binding.id));
            }
        }

        let mut bindings = Vec::with_capacity(touch_pins.len());
        for (cfg, pin) in config.bindings.iter().zip(touch_pins) {
            let mut sensor = CapacitiveSensor::new(pin, exclusion.clone(), clock.clone(), config.capacitive);
            sensor.init(cfg.sample_count).map_err(|e| EngineError::PinInit {
                id: cfg.id,
                source: Box::new(e),
            })?;
            bindings.push(NoteBinding {
                id: cfg.id,
                sensor,
                kind: cfg.kind,
                pixel: cfg.pixel,
                active: false,
            });
        }

        Ok(Self {
            impact: ImpactSensor::new(impact_pin, clock.clone(), config.piezo.debounce_ms),
            impact_note_open: false,
            impact_opened_at: 0,
            hall,
            position: PositionFilter::new(config.hall),
            range,
            range_last_run: None,
            range_last_cc: None,
            bindings: bindings.into_boxed_slice(),
            clock,
            config,
        })
    }

    /// Measure every pad's baseline now instead of on its first read.
    /// Returns how many pads calibrated cleanly.
    pub fn calibrate_all(&mut self) -> usize {
        let mut calibrated = 0;
        for binding in self.bindings.iter_mut() {
            if binding.sensor.calibrate().is_ok() {
                calibrated += 1;
            } else {
                log::warn!("pad {} runs with baseline {}", binding.id, binding.sensor.baseline_count());
            }
        }
        calibrated
    }

    /// One scheduling step. Returns the number of MIDI events sent.
    pub fn tick<M, L>(&mut self, midi: &mut M, indicators: &mut L) -> usize
    where
        M: MidiSink,
        L: IndicatorSink,
    {
        let now = self.clock.now_ms();
        let mut out = Emitter { sink: midi, sent: 0 };

        self.handle_pitch_bend(&mut out);
        self.handle_impact(now, &mut out, indicators);
        self.handle_touch_pads(&mut out, indicators);
        self.handle_range(now, &mut out);

        out.sent
    }

    fn handle_pitch_bend<M: MidiSink>(&mut self, out: &mut Emitter<'_, M>) {
        match self.hall.sample() {
            Ok(raw) => {
                if let Some(value) = self.position.step(raw) {
                    out.emit(MidiEvent::PitchBend { value });
                }
            }
            Err(e) => log::warn!("hall sample failed: {:?}", e),
        }
    }

    fn handle_impact<M: MidiSink, L: IndicatorSink>(&mut self, now: u32, out: &mut Emitter<'_, M>, indicators: &mut L) {
        let piezo = self.config.piezo;

        if self.impact.triggered() {
            if self.impact_note_open {
                out.emit(MidiEvent::NoteOff { note: piezo.note });
            }
            indicators.apply(IndicatorCommand::Blink {
                pixel: piezo.pixel,
                color: piezo.blink_color,
                period: piezo.blink_period,
                repeat: piezo.blink_repeat,
            });
            out.emit(MidiEvent::NoteOn { note: piezo.note, velocity: self.config.velocity });
            self.impact_opened_at = now;
            self.impact_note_open = true;
        }

        if self.impact_note_open && now.wrapping_sub(self.impact_opened_at) > piezo.gate_ms {
            out.emit(MidiEvent::NoteOff { note: piezo.note });
            self.impact_note_open = false;
        }
    }

    fn handle_touch_pads<M: MidiSink, L: IndicatorSink>(&mut self, out: &mut Emitter<'_, M>, indicators: &mut L) {
        let velocity = self.config.velocity;
        let color = self.config.touch_color;

        for binding in self.bindings.iter_mut() {
            // Onset on the edge...
            if binding.sensor.triggered() && !binding.active {
                binding.active = true;
                log::info!("Touch detected on pad {}", binding.id);
                indicators.apply(IndicatorCommand::Solid { pixel: binding.pixel, color });
                out.emit(binding.press_event(velocity));
            }
            // ...release on the level, so a missed falling edge still ends the note.
            if binding.active && !binding.sensor.get_state() {
                binding.active = false;
                log::info!("Touch released on pad {}", binding.id);
                indicators.apply(IndicatorCommand::Solid { pixel: binding.pixel, color: OFF });
                out.emit(binding.release_event());
            }
        }
    }

    fn handle_range<M: MidiSink>(&mut self, now: u32, out: &mut Emitter<'_, M>) {
        let Some(range) = self.range.as_mut() else {
            return;
        };
        let cfg = self.config.range;
        if let Some(last) = self.range_last_run {
            if now.wrapping_sub(last) < cfg.interval_ms {
                return;
            }
        }
        self.range_last_run = Some(now);

        let filtered = match range.try_read_range() {
            Ok(filtered) => filtered,
            Err(e) => {
                // Nothing is sent; the controller keeps its last value.
                log::error!("{}", e);
                return;
            }
        };

        let position = 1.0 - (filtered.clamp(cfg.min, cfg.max) - cfg.min) / (cfg.max - cfg.min);
        let value = (position * 127.0) as u8;
        if self.range_last_cc != Some(value) {
            out.emit(MidiEvent::ControlChange { number: cfg.cc, value });
            self.range_last_cc = Some(value);
        }
    }

    pub fn bindings(&self) -> &[Binding<B>] {
        &self.bindings
    }

    pub fn binding_active(&self, id: u8) -> Option<bool> {
        self.bindings.iter().find(|b| b.id == id).map(|b| b.active)
    }

    pub fn impact_note_open(&self) -> bool {
        self.impact_note_open
    }

    pub fn has_range_sensor(&self) -> bool {
        self.range.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
