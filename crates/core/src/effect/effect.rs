use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rhythm::phase::{fract, Ratio};
use crate::rhythm::snapshot::{Interval, Snapshot};

/// A beat-synchronised oscillator scaled into a DMX-style `min..=max` range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub effect_type: EffectType,
    pub min: u8,
    pub max: u8,
    pub params: EffectParams,
}

impl Effect {
    pub fn new(effect_type: EffectType, params: EffectParams) -> Self {
        Self {
            effect_type,
            params,
            ..Self::default()
        }
    }

    // Takes a phase (0.0 to 1.0) and returns a value (0.0 to 1.0)
    pub fn apply(&self, phase: f64) -> f64 {
        let apply_fn = match self.effect_type {
            EffectType::Sine => sine_effect,
            EffectType::Square => square_effect,
            EffectType::Sawtooth => sawtooth_effect,
            EffectType::Triangle => triangle_effect,
        };
        (apply_fn)(phase)
    }

    /// Evaluate against a frame's snapshot and scale into `min..=max`.
    pub fn value(&self, snapshot: &Snapshot) -> u8 {
        let level = self.apply(get_effect_phase(snapshot, &self.params));
        let (lo, hi) = (f64::from(self.min), f64::from(self.max));
        (lo + (hi - lo) * level).round().clamp(0.0, 255.0) as u8
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} per {} {}..{}",
            self.effect_type.as_str(),
            self.params.ratio,
            self.params.interval.display_name(),
            self.min,
            self.max
        )?;
        if self.params.phase != 0.0 {
            write!(f, " {:+.2}", self.params.phase)?;
        }
        Ok(())
    }
}

impl Default for Effect {
    fn default() -> Self {
        Self {
            effect_type: EffectType::Sine,
            min: 0,
            max: 255,
            params: EffectParams::default(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum EffectType {
    Sine,
    Sawtooth,
    Square,
    Triangle,
}

impl EffectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectType::Sine => "Sine",
            EffectType::Sawtooth => "Sawtooth",
            EffectType::Square => "Square",
            EffectType::Triangle => "Triangle",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectParams {
    pub interval: Interval,
    /// Oscillator period relative to the interval; `4` spans four markers,
    /// `1/2` runs twice per marker.
    pub ratio: Ratio,
    /// Phase offset, in cycles
    pub phase: f64,
}

impl Default for EffectParams {
    fn default() -> Self {
        EffectParams {
            interval: Interval::Beat,
            ratio: Ratio::ONE,
            phase: 0.0,
        }
    }
}

pub fn get_effect_phase(snapshot: &Snapshot, params: &EffectParams) -> f64 {
    fract(snapshot.phase(params.interval, params.ratio) + params.phase)
}

pub fn sine_effect(phase: f64) -> f64 {
    (phase * 2.0 * PI).sin() * 0.5 + 0.5
}

pub fn square_effect(phase: f64) -> f64 {
    if phase < 0.5 {
        1.0
    } else {
        0.0
    }
}

pub fn sawtooth_effect(phase: f64) -> f64 {
    phase
}

pub fn triangle_effect(phase: f64) -> f64 {
    if phase < 0.5 {
        phase * 2.0
    } else {
        2.0 - phase * 2.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    // 120 BPM, 4/4, `elapsed` ms after beat 1.
    fn snapshot(elapsed: f64) -> Snapshot {
        Snapshot::new(elapsed, 0.0, 0.0, 120.0, 4).unwrap()
    }

    #[test]
    fn test_waveforms() {
        assert_relative_eq!(sine_effect(0.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(sine_effect(0.25), 1.0, epsilon = 1e-12);
        assert_eq!(square_effect(0.2), 1.0);
        assert_eq!(square_effect(0.7), 0.0);
        assert_eq!(sawtooth_effect(0.3), 0.3);
        assert_relative_eq!(triangle_effect(0.25), 0.5);
        assert_relative_eq!(triangle_effect(0.75), 0.5);
    }

    #[test]
    fn test_effect_phase_follows_interval_and_ratio() {
        // Beat 3, half way through; bar 1 at 0.625.
        let snap = snapshot(1250.0);

        let beat = EffectParams::default();
        assert_relative_eq!(get_effect_phase(&snap, &beat), 0.5, epsilon = 1e-12);

        let bar = EffectParams {
            interval: Interval::Bar,
            ..EffectParams::default()
        };
        assert_relative_eq!(get_effect_phase(&snap, &bar), 0.625, epsilon = 1e-12);

        let two_beats = EffectParams {
            ratio: Ratio::integer(2).unwrap(),
            ..EffectParams::default()
        };
        assert_relative_eq!(get_effect_phase(&snap, &two_beats), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_effect_phase_offset_wraps() {
        let snap = snapshot(1250.0);
        let params = EffectParams {
            phase: 0.75,
            ..EffectParams::default()
        };
        assert_relative_eq!(get_effect_phase(&snap, &params), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_value_scales_into_range() {
        let saw = Effect {
            effect_type: EffectType::Sawtooth,
            min: 100,
            max: 200,
            params: EffectParams::default(),
        };
        assert_eq!(saw.value(&snapshot(0.0)), 100);
        assert_eq!(saw.value(&snapshot(250.0)), 150);

        let square = Effect::new(EffectType::Square, EffectParams::default());
        assert_eq!(square.value(&snapshot(100.0)), 255);
        assert_eq!(square.value(&snapshot(400.0)), 0);
    }

    #[test]
    fn test_effect_describes_itself() {
        let pulse = Effect::new(EffectType::Sine, EffectParams::default());
        assert_eq!(pulse.to_string(), "Sine 1 per beat 0..255");

        let sweep = Effect {
            effect_type: EffectType::Triangle,
            min: 10,
            max: 200,
            params: EffectParams {
                interval: Interval::Bar,
                ratio: Ratio::new(3, 2).unwrap(),
                phase: 0.25,
            },
        };
        assert_eq!(sweep.to_string(), "Triangle 3/2 per bar 10..200 +0.25");
    }

    #[test]
    fn test_inverted_range() {
        let saw = Effect {
            effect_type: EffectType::Sawtooth,
            min: 255,
            max: 0,
            params: EffectParams::default(),
        };
        assert_eq!(saw.value(&snapshot(0.0)), 255);
        assert_eq!(saw.value(&snapshot(250.0)), 128);
    }
}
