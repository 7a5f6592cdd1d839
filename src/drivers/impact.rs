// Membrain: Piezo Impact Trigger
//
// The piezo feeds a comparator, so the pin sees a short high pulse per hit.
// Pull resistors stay disabled on this pin (chip errata); the board carries
// an external pull-down.

use embedded_hal::digital::InputPin;

use crate::board::Clock;

pub struct ImpactSensor<P, C> {
    pin: P,
    clock: C,
    debounce_ms: u32,
    raw_level: bool,
    previous_raw_level: bool,
    last_trigger: Option<u32>,
}

impl<P, C> ImpactSensor<P, C>
where
    P: InputPin,
    C: Clock,
{
    /// `pin` must already be a plain input without pulls.
    pub fn new(pin: P, clock: C, debounce_ms: u32) -> Self {
        Self {
            pin,
            clock,
            debounce_ms,
            raw_level: false,
            previous_raw_level: false,
            last_trigger: None,
        }
    }

    /// Rising edge, gated by the debounce window.
    ///
    /// Inside the window the pin is not even sampled, so an edge that starts
    /// and ends there is never seen.
    pub fn triggered(&mut self) -> bool {
        let now = self.clock.now_ms();
        if let Some(last) = self.last_trigger {
            if now.wrapping_sub(last) < self.debounce_ms {
                return false;
            }
        }

        self.previous_raw_level = self.raw_level;
        self.raw_level = self.pin.is_high().unwrap_or_else(|e| {
            log::error!("piezo pin read failed: {:?}", e);
            false
        });

        if self.raw_level && !self.previous_raw_level {
            log::debug!("Piezo triggered");
            self.last_trigger = Some(now);
            return true;
        }
        false
    }

    pub fn last_trigger(&self) -> Option<u32> {
        self.last_trigger
    }
}
