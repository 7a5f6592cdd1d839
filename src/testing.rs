// Simulated hardware for unit tests.
//
// All fakes share state through `Rc` handles so a test can keep one clone
// to script inputs and inspect what the driver did.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin};
use embedded_hal::digital::ErrorKind as PinErrorKind;
use embedded_hal::i2c::{self, ErrorKind, I2c, Operation, SevenBitAddress};

use crate::board::{Board, ChargePin, Clock, Exclusion};
use crate::drivers::hall::HallInputs;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Manually driven clock. `auto_step` advances the time on every read, which
/// lets busy-wait windows terminate without real delays.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u32>>,
    auto_step: Rc<Cell<u32>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_step(step: u32) -> Self {
        let clock = Self::new();
        clock.auto_step.set(step);
        clock
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }

    pub fn peek(&self) -> u32 {
        self.now.get()
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.auto_step.get()));
        now
    }
}

/// Delay that only moves the simulated clock forward.
#[derive(Debug, Clone)]
pub struct SimDelay {
    clock: SimClock,
    pub calls: Rc<Cell<u32>>,
}

impl SimDelay {
    pub fn new(clock: SimClock) -> Self {
        Self { clock, calls: Rc::default() }
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls.set(self.calls.get() + 1);
        self.clock.advance(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls.set(self.calls.get() + 1);
        self.clock.advance(ms);
    }
}

// ---------------------------------------------------------------------------
// GPIO
// ---------------------------------------------------------------------------

/// Exclusion that records whether a section is currently open.
#[derive(Debug, Clone, Default)]
pub struct SimExclusion {
    pub inside: Rc<Cell<bool>>,
    pub entries: Rc<Cell<u32>>,
    pub nested: Rc<Cell<u32>>,
}

impl Exclusion for SimExclusion {
    fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.inside.get() {
            self.nested.set(self.nested.get() + 1);
        }
        self.entries.set(self.entries.get() + 1);
        self.inside.set(true);
        let result = f();
        self.inside.set(false);
        result
    }
}

/// Charge pin whose rise time is scripted per cycle, in polling iterations.
#[derive(Debug, Clone)]
pub struct SimChargePin {
    rise: Rc<RefCell<VecDeque<u32>>>,
    default_rise: Rc<Cell<u32>>,
    remaining: Option<u32>,
    section: Rc<Cell<bool>>,
    pub unguarded_transitions: Rc<Cell<u32>>,
    pub guarded_polls: Rc<Cell<u32>>,
    pub cycles: Rc<Cell<u32>>,
    /// `is_high` errors while set.
    pub fail_polls: Rc<Cell<bool>>,
    /// Direction changes error while set.
    pub fail_transitions: Rc<Cell<bool>>,
}

impl SimChargePin {
    pub fn new(default_rise: u32, exclusion: &SimExclusion) -> Self {
        Self {
            rise: Rc::default(),
            default_rise: Rc::new(Cell::new(default_rise)),
            remaining: None,
            section: exclusion.inside.clone(),
            unguarded_transitions: Rc::default(),
            guarded_polls: Rc::default(),
            cycles: Rc::default(),
            fail_polls: Rc::default(),
            fail_transitions: Rc::default(),
        }
    }

    /// Queue explicit rise times for the next cycles.
    pub fn script(&self, rises: impl IntoIterator<Item = u32>) {
        self.rise.borrow_mut().extend(rises);
    }

    /// Rise time used once the script runs dry.
    pub fn set_default_rise(&self, rise: u32) {
        self.default_rise.set(rise);
    }

    fn check_guarded(&self) -> Result<(), PinErrorKind> {
        if !self.section.get() {
            self.unguarded_transitions.set(self.unguarded_transitions.get() + 1);
        }
        if self.fail_transitions.get() {
            return Err(PinErrorKind::Other);
        }
        Ok(())
    }
}

impl ChargePin for SimChargePin {
    type Error = PinErrorKind;

    fn set_input_pullup(&mut self) -> Result<(), PinErrorKind> {
        self.check_guarded()?;
        self.cycles.set(self.cycles.get() + 1);
        let rise = self.rise.borrow_mut().pop_front().unwrap_or(self.default_rise.get());
        self.remaining = Some(rise);
        Ok(())
    }

    fn set_output_low(&mut self) -> Result<(), PinErrorKind> {
        self.check_guarded()?;
        self.remaining = None;
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, PinErrorKind> {
        if self.fail_polls.get() {
            return Err(PinErrorKind::Other);
        }
        if self.section.get() {
            self.guarded_polls.set(self.guarded_polls.get() + 1);
        }
        match self.remaining.as_mut() {
            Some(0) => Ok(true),
            Some(n) => {
                *n -= 1;
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

/// Digital input that plays back a level sequence, then holds the last level.
#[derive(Debug, Clone, Default)]
pub struct SimInputPin {
    levels: Rc<RefCell<VecDeque<bool>>>,
    held: Rc<Cell<bool>>,
    pub fail: Rc<Cell<bool>>,
}

impl SimInputPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, levels: impl IntoIterator<Item = bool>) {
        self.levels.borrow_mut().extend(levels);
    }

    pub fn hold(&self, level: bool) {
        self.levels.borrow_mut().clear();
        self.held.set(level);
    }
}

impl digital::ErrorType for SimInputPin {
    type Error = PinErrorKind;
}

impl InputPin for SimInputPin {
    fn is_high(&mut self) -> Result<bool, PinErrorKind> {
        if self.fail.get() {
            return Err(PinErrorKind::Other);
        }
        if let Some(level) = self.levels.borrow_mut().pop_front() {
            self.held.set(level);
        }
        Ok(self.held.get())
    }

    fn is_low(&mut self) -> Result<bool, PinErrorKind> {
        self.is_high().map(|high| !high)
    }
}

// ---------------------------------------------------------------------------
// I2C register map
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SimBusState {
    pub registers: HashMap<u16, u8>,
    /// Values returned by successive reads of one register, before falling
    /// back to `registers`.
    pub read_scripts: HashMap<u16, VecDeque<u8>>,
    pub reads: Vec<u16>,
    pub writes: Vec<(u16, u8)>,
    pub fail_all: bool,
    pub fail_register: Option<u16>,
    pub wrong_address: u32,
}

/// VL6180X-shaped register file: 16-bit big-endian addresses, one data byte.
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    pub state: Rc<RefCell<SimBusState>>,
    address: u8,
}

impl SimBus {
    pub fn new(address: u8) -> Self {
        Self { state: Rc::default(), address }
    }

    pub fn set(&self, reg: u16, value: u8) {
        self.state.borrow_mut().registers.insert(reg, value);
    }

    pub fn get(&self, reg: u16) -> Option<u8> {
        self.state.borrow().registers.get(&reg).copied()
    }

    pub fn script_reads(&self, reg: u16, values: impl IntoIterator<Item = u8>) {
        self.state.borrow_mut().read_scripts.entry(reg).or_default().extend(values);
    }

    pub fn reads_of(&self, reg: u16) -> usize {
        self.state.borrow().reads.iter().filter(|&&r| r == reg).count()
    }

    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.state.borrow().writes.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.reads.clear();
        state.writes.clear();
    }
}

impl i2c::ErrorType for SimBus {
    type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for SimBus {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        let mut state = self.state.borrow_mut();
        if address != self.address {
            state.wrong_address += 1;
            return Err(ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address));
        }
        if state.fail_all {
            return Err(ErrorKind::Bus);
        }

        let mut pointer: Option<u16> = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    if bytes.len() < 2 {
                        return Err(ErrorKind::Other);
                    }
                    let reg = u16::from_be_bytes([bytes[0], bytes[1]]);
                    if state.fail_register == Some(reg) {
                        return Err(ErrorKind::Bus);
                    }
                    pointer = Some(reg);
                    if let Some(&value) = bytes.get(2) {
                        state.writes.push((reg, value));
                        state.registers.insert(reg, value);
                    }
                }
                Operation::Read(buf) => {
                    let reg = pointer.ok_or(ErrorKind::Other)?;
                    state.reads.push(reg);
                    let scripted = state.read_scripts.get_mut(&reg).and_then(|q| q.pop_front());
                    let value = scripted.or_else(|| state.registers.get(&reg).copied()).unwrap_or(0);
                    for b in buf.iter_mut() {
                        *b = value;
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hall inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimHall {
    pub sample: Rc<Cell<[u16; 3]>>,
    pub fail: Rc<Cell<bool>>,
}

impl SimHall {
    pub fn centered() -> Self {
        Self { sample: Rc::new(Cell::new([2048; 3])), fail: Rc::default() }
    }

    pub fn set(&self, sample: [u16; 3]) {
        self.sample.set(sample);
    }
}

impl HallInputs for SimHall {
    type Error = ErrorKind;

    fn sample(&mut self) -> Result<[u16; 3], ErrorKind> {
        if self.fail.get() {
            return Err(ErrorKind::Other);
        }
        Ok(self.sample.get())
    }
}

// ---------------------------------------------------------------------------
// Board bundle
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SimBoard;

impl Board for SimBoard {
    type ChargePin = SimChargePin;
    type ImpactPin = SimInputPin;
    type Bus = SimBus;
    type Delay = SimDelay;
    type Hall = SimHall;
    type Clock = SimClock;
    type Exclusion = SimExclusion;
}
