// Membrain: Hardware Seams
//
// Everything the engine touches on the board goes through one of these
// traits, so the same sensor code runs against ESP-IDF peripherals on the
// target and against simulated pins, buses and clocks in tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use embedded_hal::i2c::I2c;

use crate::drivers::hall::HallInputs;

/// Monotonic millisecond clock. Wraps at ~49 days; compare with
/// `wrapping_sub` only.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// A GPIO that capacitive sensing flips between a pulled-up input (to let the
/// pad charge) and a driven-low output (to discharge it).
pub trait ChargePin {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn set_input_pullup(&mut self) -> Result<(), Self::Error>;
    fn set_output_low(&mut self) -> Result<(), Self::Error>;
    fn is_high(&mut self) -> Result<bool, Self::Error>;
}

/// Mutual exclusion against every execution context that can touch GPIO
/// state, including other cores and interrupt handlers.
///
/// Sections must stay short: one direction or level change, never a
/// polling loop.
pub trait Exclusion {
    fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R;
}

/// Exclusion backed by the `critical-section` implementation linked into the
/// binary (ESP-IDF on target, the `std` mutex on the host).
#[derive(Debug, Clone, Copy, Default)]
pub struct CriticalSectionExclusion;

impl Exclusion for CriticalSectionExclusion {
    fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        critical_section::with(|_| f())
    }
}

/// One concrete implementation of every seam, so the engine carries a single
/// type parameter.
pub trait Board {
    type ChargePin: ChargePin;
    type ImpactPin: InputPin;
    type Bus: I2c;
    type Delay: DelayNs;
    type Hall: HallInputs;
    type Clock: Clock + Clone;
    type Exclusion: Exclusion + Clone;
}
