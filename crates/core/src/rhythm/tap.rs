use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::Result;
use crate::rhythm::metronome::{beat_ms, Metro};

pub const DEFAULT_TAP_TIMEOUT_MS: f64 = 2000.0;
pub const DEFAULT_TAP_WINDOW: usize = 4;

#[derive(Debug, Default)]
struct TapState {
    last_tap: Option<f64>,
    intervals: VecDeque<f64>,
    tap_count: u32,
}

/// Tap tempo: derive BPM from a performer hitting a button on the beat.
///
/// Each tap lands on a beat boundary, so once two taps have been seen the
/// metronome takes the averaged tempo and its beat phase snaps to zero. A
/// pause longer than the timeout starts a fresh sequence.
#[derive(Debug)]
pub struct TapTempo {
    state: Mutex<TapState>,
    timeout_ms: f64,
    window: usize,
}

impl TapTempo {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_TAP_WINDOW, DEFAULT_TAP_TIMEOUT_MS)
    }

    /// Average over the last `window` intervals; forget taps older than
    /// `timeout_ms`.
    pub fn with_settings(window: usize, timeout_ms: f64) -> Self {
        Self {
            state: Mutex::new(TapState::default()),
            timeout_ms,
            window: window.max(1),
        }
    }

    /// Register a tap at the metronome's current time.
    ///
    /// Returns the tempo applied, or `None` for the first tap of a sequence.
    pub fn tap<M: Metro + ?Sized>(&self, metro: &M) -> Result<Option<f64>> {
        let now = metro.now_ms();
        let mut state = self.state.lock();

        match state.last_tap {
            Some(last) if now > last && now - last <= self.timeout_ms => {
                state.intervals.push_back(now - last);
                while state.intervals.len() > self.window {
                    state.intervals.pop_front();
                }
                state.tap_count += 1;
            }
            _ => {
                state.intervals.clear();
                state.tap_count = 1;
            }
        }
        state.last_tap = Some(now);

        if state.intervals.is_empty() {
            log::debug!("Tap sequence started");
            return Ok(None);
        }

        let average = state.intervals.iter().sum::<f64>() / state.intervals.len() as f64;
        // beat_ms is its own inverse
        let bpm = beat_ms(average);
        metro.set_bpm(bpm)?;
        metro.set_beat_phase(0.0)?;

        log::debug!(
            "Tap {}: {:.1} ms average -> {:.2} BPM",
            state.tap_count,
            average,
            bpm
        );
        Ok(Some(bpm))
    }

    /// Taps in the current sequence.
    pub fn tap_count(&self) -> u32 {
        self.state.lock().tap_count
    }

    pub fn last_tap(&self) -> Option<f64> {
        self.state.lock().last_tap
    }

    pub fn reset(&self) {
        *self.state.lock() = TapState::default();
    }
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_relative_eq;

    use super::*;
    use crate::clock::ManualClock;
    use crate::rhythm::metronome::Metronome;

    fn setup() -> (Arc<ManualClock>, Metronome<Arc<ManualClock>>) {
        let clock = Arc::new(ManualClock::new(50_000.0));
        let metro = Metronome::with_clock(120.0, clock.clone()).unwrap();
        (clock, metro)
    }

    #[test]
    fn test_first_tap_only_starts_sequence() {
        let (_, metro) = setup();
        let tapper = TapTempo::new();

        assert_eq!(tapper.tap(&metro).unwrap(), None);
        assert_eq!(tapper.tap_count(), 1);
        assert_eq!(metro.bpm(), 120.0);
    }

    #[test]
    fn test_steady_taps_set_tempo_and_phase() {
        let (clock, metro) = setup();
        let tapper = TapTempo::new();

        tapper.tap(&metro).unwrap();
        for _ in 0..3 {
            clock.advance(600.0);
            let bpm = tapper.tap(&metro).unwrap().unwrap();
            assert_relative_eq!(bpm, 100.0, epsilon = 1e-9);
        }

        assert_eq!(tapper.tap_count(), 4);
        assert_relative_eq!(metro.bpm(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(metro.beat_phase(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_average_uses_recent_window() {
        let (clock, metro) = setup();
        let tapper = TapTempo::with_settings(2, 2000.0);

        tapper.tap(&metro).unwrap();
        for interval in [1000.0, 500.0, 500.0] {
            clock.advance(interval);
            tapper.tap(&metro).unwrap();
        }

        // Only the last two 500 ms intervals count.
        assert_relative_eq!(metro.bpm(), 120.0, epsilon = 1e-9);
    }

    #[test]
    fn test_long_pause_restarts_sequence() {
        let (clock, metro) = setup();
        let tapper = TapTempo::new();

        tapper.tap(&metro).unwrap();
        clock.advance(400.0);
        tapper.tap(&metro).unwrap();
        assert_relative_eq!(metro.bpm(), 150.0, epsilon = 1e-9);

        clock.advance(5000.0);
        assert_eq!(tapper.tap(&metro).unwrap(), None);
        assert_eq!(tapper.tap_count(), 1);
        assert_relative_eq!(metro.bpm(), 150.0, epsilon = 1e-9);

        tapper.reset();
        assert_eq!(tapper.last_tap(), None);
    }
}
