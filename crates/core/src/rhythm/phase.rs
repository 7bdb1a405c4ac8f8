//! Marker and phase arithmetic shared by the metronome and its snapshots.
//!
//! A "marker" is a beat or a bar. Markers are numbered from 1: the marker
//! that starts exactly at the origin is marker 1, the one before it is
//! marker 0, and so on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RhythmError, Result};

/// Fractional part of a real number, always in `[0, 1)`.
///
/// Unlike [`f64::fract`] this does not truncate toward zero, so negative
/// inputs wrap around instead of producing negative phases.
pub fn fract(x: f64) -> f64 {
    let f = x - x.floor();
    // -1e-20 - floor(-1e-20) rounds to exactly 1.0
    if f >= 1.0 {
        0.0
    } else {
        f
    }
}

/// 1-based number of the marker active at `instant`.
pub fn marker_number(instant: f64, origin: f64, interval: f64) -> i64 {
    ((instant - origin) / interval).floor() as i64 + 1
}

/// Progress through the marker active at `instant`, in `[0, 1)`.
pub fn marker_phase(instant: f64, origin: f64, interval: f64) -> f64 {
    fract((instant - origin) / interval)
}

const MAX_SETTLE_STEPS: usize = 64;

/// Adjust `origin` by whole ulps until `instant` falls in marker `marker`.
///
/// At epoch-millisecond magnitudes `instant - position * interval` rounds,
/// and a marker boundary computed that way can land a hair on the wrong
/// side. The correction moves the origin by a few ulps at most.
pub(crate) fn settle_origin(instant: f64, mut origin: f64, interval: f64, marker: i64) -> f64 {
    for _ in 0..MAX_SETTLE_STEPS {
        let found = marker_number(instant, origin, interval);
        if found < marker {
            origin = next_down(origin);
        } else if found > marker {
            origin = next_up(origin);
        } else {
            break;
        }
    }
    origin
}

fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        x
    } else if x == 0.0 {
        f64::from_bits(1)
    } else if x > 0.0 {
        f64::from_bits(x.to_bits() + 1)
    } else {
        f64::from_bits(x.to_bits() - 1)
    }
}

fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

/// Re-express a marker phase for an oscillator running at `ratio` of the
/// marker rate.
///
/// The numerator stretches the period across that many consecutive markers,
/// giving one continuous ramp over the whole span. The denominator then
/// squeezes that many cycles into the period.
pub fn enhanced_phase(marker: i64, phase: f64, ratio: Ratio) -> f64 {
    if ratio.is_one() {
        return phase;
    }

    let numer = i64::from(ratio.numer());
    let stretched = if numer > 1 {
        ((marker - 1).rem_euclid(numer) as f64 + phase) / numer as f64
    } else {
        phase
    };

    fract(stretched * f64::from(ratio.denom()))
}

/// A positive rational number kept in lowest terms.
///
/// `Ratio::new(4, 1)` spans four markers per cycle; `Ratio::new(1, 2)` runs
/// two cycles per marker; `Ratio::new(3, 2)` runs two cycles every three
/// markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 2]", into = "[u32; 2]")]
pub struct Ratio {
    numer: u32,
    denom: u32,
}

impl Ratio {
    pub const ONE: Ratio = Ratio { numer: 1, denom: 1 };

    pub fn new(numer: u32, denom: u32) -> Result<Self> {
        if numer == 0 || denom == 0 {
            return Err(RhythmError::InvalidArgument(format!(
                "ratio terms must be positive, got {}/{}",
                numer, denom
            )));
        }
        let g = gcd(numer, denom);
        Ok(Self {
            numer: numer / g,
            denom: denom / g,
        })
    }

    /// A whole number of markers per cycle.
    pub fn integer(n: u32) -> Result<Self> {
        Self::new(n, 1)
    }

    /// `n` cycles per marker.
    pub fn per_marker(n: u32) -> Result<Self> {
        Self::new(1, n)
    }

    pub fn numer(&self) -> u32 {
        self.numer
    }

    pub fn denom(&self) -> u32 {
        self.denom
    }

    pub fn is_integer(&self) -> bool {
        self.denom == 1
    }

    pub fn is_one(&self) -> bool {
        self.numer == 1 && self.denom == 1
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.numer)
        } else {
            write!(f, "{}/{}", self.numer, self.denom)
        }
    }
}

impl TryFrom<[u32; 2]> for Ratio {
    type Error = RhythmError;

    fn try_from([numer, denom]: [u32; 2]) -> Result<Self> {
        Self::new(numer, denom)
    }
}

impl From<Ratio> for [u32; 2] {
    fn from(ratio: Ratio) -> Self {
        [ratio.numer, ratio.denom]
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_marker_number_is_one_based() {
        assert_eq!(marker_number(1000.0, 1000.0, 500.0), 1);
        assert_eq!(marker_number(1499.9, 1000.0, 500.0), 1);
        assert_eq!(marker_number(1500.0, 1000.0, 500.0), 2);
        assert_eq!(marker_number(2250.0, 1000.0, 500.0), 3);
    }

    #[test]
    fn test_marker_before_origin() {
        assert_eq!(marker_number(999.0, 1000.0, 500.0), 0);
        assert_eq!(marker_number(400.0, 1000.0, 500.0), -1);
        assert_relative_eq!(marker_phase(900.0, 1000.0, 500.0), 0.8, epsilon = 1e-12);
        assert_relative_eq!(marker_phase(400.0, 1000.0, 500.0), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_marker_phase_decomposition() {
        let origin = 12_345.0;
        let interval = 437.5;
        for step in -40..40 {
            let t = origin + step as f64 * 123.7;
            let phase = marker_phase(t, origin, interval);
            let number = marker_number(t, origin, interval);
            assert!((0.0..1.0).contains(&phase), "phase {} out of range", phase);
            assert_relative_eq!(
                (number - 1) as f64 + phase,
                (t - origin) / interval,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_settle_origin_at_epoch_scale() {
        let now = 1_760_000_123_456.789;
        let tick = 60_000.0 / 97.3;
        for n in 1..400 {
            let origin = settle_origin(now, now - (n - 1) as f64 * tick, tick, n);
            assert_eq!(marker_number(now, origin, tick), n);
            assert!(marker_phase(now, origin, tick) < 1e-5);
        }
    }

    #[test]
    fn test_settle_origin_leaves_exact_origins_alone() {
        assert_eq!(settle_origin(2_000.0, 1_000.0, 500.0, 3), 1_000.0);
        assert_eq!(next_down(next_up(-3.5)), -3.5);
        assert!(next_up(0.0) > 0.0);
        assert!(next_down(0.0) < 0.0);
    }

    #[test]
    fn test_fract_never_returns_one() {
        assert_eq!(fract(-1e-20), 0.0);
        assert_relative_eq!(fract(-0.25), 0.75);
        assert_relative_eq!(fract(3.5), 0.5);
    }

    #[test]
    fn test_enhanced_phase_identity() {
        for marker in [-3, 0, 1, 2, 17] {
            assert_eq!(enhanced_phase(marker, 0.42, Ratio::ONE), 0.42);
        }
    }

    #[test]
    fn test_enhanced_phase_faster() {
        let half = Ratio::new(1, 2).unwrap();
        assert_relative_eq!(enhanced_phase(5, 0.3, half), 0.6, epsilon = 1e-12);
        assert_relative_eq!(enhanced_phase(5, 0.7, half), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_enhanced_phase_slower_ramps_across_markers() {
        let four = Ratio::integer(4).unwrap();
        assert_relative_eq!(enhanced_phase(5, 0.3, four), 0.075, epsilon = 1e-12);
        assert_relative_eq!(enhanced_phase(6, 0.3, four), 0.325, epsilon = 1e-12);
        assert_relative_eq!(enhanced_phase(8, 0.5, four), 0.875, epsilon = 1e-12);
        assert_relative_eq!(enhanced_phase(9, 0.0, four), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_enhanced_phase_true_fraction() {
        // Two cycles every three markers.
        let ratio = Ratio::new(3, 2).unwrap();
        // Marker 2 halfway: (1 + 0.5) / 3 = 0.5 of the span, times 2 cycles.
        assert_relative_eq!(enhanced_phase(2, 0.5, ratio), 0.0, epsilon = 1e-12);
        assert_relative_eq!(enhanced_phase(1, 0.75, ratio), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_enhanced_phase_markers_before_origin() {
        let four = Ratio::integer(4).unwrap();
        // Marker 0 is the last marker of the previous four-marker span.
        assert_relative_eq!(enhanced_phase(0, 0.0, four), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_ratio_reduces_to_lowest_terms() {
        let ratio = Ratio::new(6, 4).unwrap();
        assert_eq!((ratio.numer(), ratio.denom()), (3, 2));
        assert!(!ratio.is_integer());

        let whole = Ratio::new(8, 2).unwrap();
        assert!(whole.is_integer());
        assert_eq!(whole.numer(), 4);
        assert_eq!(whole.to_string(), "4");
        assert_eq!(ratio.to_string(), "3/2");
    }

    #[test]
    fn test_ratio_rejects_zero_terms() {
        assert!(matches!(
            Ratio::new(0, 3),
            Err(RhythmError::InvalidArgument(_))
        ));
        assert!(Ratio::per_marker(0).is_err());
    }

    #[test]
    fn test_ratio_serde_validates() {
        let ratio: Ratio = serde_json::from_str("[2, 4]").unwrap();
        assert_eq!(ratio, Ratio::new(1, 2).unwrap());
        assert_eq!(serde_json::to_string(&ratio).unwrap(), "[1,2]");
        assert!(serde_json::from_str::<Ratio>("[0, 4]").is_err());
    }
}
