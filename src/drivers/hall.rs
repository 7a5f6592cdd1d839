// Membrain: Hall-Effect Pitch Bend
//
// Three Hall sensors under the bend plate are fused into one position,
// smoothed, and only reported when it moved far enough out of the rest
// position.

use crate::config::HallConfig;
use crate::events::{PITCH_BEND_CENTER, PITCH_BEND_MAX};

const WEIGHTS: [f32; 3] = [3.0, 2.0, 1.0];
const WEIGHT_SUM: f32 = 6.0;
const PITCH_BEND_SPAN: f32 = 8191.0;

/// Raw converter readings, ordered primary, secondary, tertiary.
pub trait HallInputs {
    type Error: core::fmt::Debug;

    fn sample(&mut self) -> Result<[u16; 3], Self::Error>;
}

#[derive(Debug, Clone)]
pub struct PositionFilter {
    config: HallConfig,
    previous_output: f32,
    last_sent: f32,
}

impl PositionFilter {
    pub fn new(config: HallConfig) -> Self {
        Self {
            config,
            previous_output: 0.0,
            last_sent: 0.0,
        }
    }

    pub fn normalize(&self, raw: u16) -> f32 {
        (f32::from(raw) - self.config.midpoint) / self.config.midpoint
    }

    /// Feed one sample set. Returns the 14-bit bend value when one should go
    /// out.
    pub fn step(&mut self, raw: [u16; 3]) -> Option<u16> {
        let weighted = raw
            .iter()
            .zip(WEIGHTS)
            .map(|(&r, w)| w * self.normalize(r))
            .sum::<f32>()
            / WEIGHT_SUM;

        let a1 = self.config.a1;
        let output = (1.0 - a1.abs()) * weighted + a1 * self.previous_output;
        self.previous_output = output;

        let moved = (output - self.last_sent).abs() > self.config.hysteresis;
        if !moved || output <= self.config.deadzone {
            return None;
        }

        self.last_sent = output;
        Some(Self::to_pitch_bend(output))
    }

    fn to_pitch_bend(output: f32) -> u16 {
        let value = (f32::from(PITCH_BEND_CENTER) + PITCH_BEND_SPAN * output).round();
        value.clamp(0.0, f32::from(PITCH_BEND_MAX)) as u16
    }

    pub fn output(&self) -> f32 {
        self.previous_output
    }

    pub fn last_sent(&self) -> f32 {
        self.last_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> PositionFilter {
        PositionFilter::new(HallConfig::default())
    }

    #[test]
    fn rest_position_never_bends() {
        let mut f = filter();
        for _ in 0..500 {
            assert_eq!(f.step([2048, 2048, 2048]), None);
        }
        assert_eq!(f.output(), 0.0);
    }

    #[test]
    fn small_offset_stays_in_deadzone() {
        let mut f = filter();
        // 0.05 on every channel converges to 0.05 < 0.08.
        let raw = 2048 + (0.05 * 2048.0) as u16;
        for _ in 0..500 {
            assert_eq!(f.step([raw; 3]), None);
        }
        assert!((f.output() - 0.05).abs() < 1e-3);
    }

    #[test]
    fn weights_favor_primary() {
        let mut a = filter();
        let mut b = filter();
        for _ in 0..200 {
            a.step([3072, 2048, 2048]);
            b.step([2048, 2048, 3072]);
        }
        assert!((a.output() - 0.25).abs() < 1e-3);
        assert!((b.output() - 0.5 / 6.0).abs() < 1e-3);
    }

    #[test]
    fn sustained_offset_converges_and_matches_mapping() {
        let mut f = filter();
        let mut sent = Vec::new();
        for _ in 0..300 {
            if let Some(v) = f.step([3072, 3072, 3072]) {
                sent.push(v);
            }
        }

        let last = *sent.last().unwrap();
        let expected = (8192.0 + 8191.0 * f.last_sent()).round() as i32;
        assert!((i32::from(last) - expected).abs() <= 1);
        // Converged on 0.5 to within the hysteresis band.
        assert!((f.output() - 0.5).abs() < 1e-3);
        assert!((f.last_sent() - 0.5).abs() <= 0.01);
        // Monotonic rise, no chatter once settled.
        assert!(sent.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn hysteresis_suppresses_repeats() {
        let mut f = filter();
        let mut count = 0;
        for _ in 0..1000 {
            if f.step([3500, 3500, 3500]).is_some() {
                count += 1;
            }
        }
        // Only the approach is reported; steady state is quiet.
        assert!(count > 0 && count < 50);
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        let mut f = filter();
        let mut last = None;
        for _ in 0..200 {
            last = f.step([9000, 9000, 9000]).or(last);
        }
        assert_eq!(last, Some(16383));
    }
}
