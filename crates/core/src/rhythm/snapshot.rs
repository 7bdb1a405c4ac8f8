use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{validate_bpb, validate_bpm, RhythmError, Result};
use crate::rhythm::metronome::beat_ms;
use crate::rhythm::phase::{enhanced_phase, marker_number, marker_phase, Ratio};

/// Which marker an oscillator follows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    Beat,
    Bar,
}

impl Interval {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Beat => "beat",
            Self::Bar => "bar",
        }
    }
}

/// The metronome's timeline frozen at one instant.
///
/// Everything frame-dependent reads from one of these rather than from the
/// live metronome, so every effect rendered in a frame agrees on where the
/// music is even though the effects themselves run at slightly different
/// times.
///
/// Only the origins, tempo, signature and instant are read back when
/// deserializing; beat, bar and phases are always recomputed from them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotParts")]
pub struct Snapshot {
    start: f64,
    bar_start: f64,
    bpm: f64,
    bpb: u32,
    instant: f64,
    beat: i64,
    bar: i64,
    beat_phase: f64,
    bar_phase: f64,
}

impl Snapshot {
    /// Capture the timeline described by the origins, tempo and signature as
    /// of `instant`.
    pub fn new(instant: f64, start: f64, bar_start: f64, bpm: f64, bpb: u32) -> Result<Self> {
        let bpm = validate_bpm(bpm)?;
        let bpb = validate_bpb(bpb)?;
        for (name, value) in [("instant", instant), ("start", start), ("bar_start", bar_start)] {
            if !value.is_finite() {
                return Err(RhythmError::InvalidArgument(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        Ok(Self::capture(instant, start, bar_start, bpm, bpb))
    }

    /// Unchecked [`Snapshot::new`] for values read off a live metronome,
    /// which never holds an invalid tempo or signature.
    pub(crate) fn capture(instant: f64, start: f64, bar_start: f64, bpm: f64, bpb: u32) -> Self {
        let tick = beat_ms(bpm);
        let tock = tick * f64::from(bpb);
        Self {
            start,
            bar_start,
            bpm,
            bpb,
            instant,
            beat: marker_number(instant, start, tick),
            bar: marker_number(instant, bar_start, tock),
            beat_phase: marker_phase(instant, start, tick),
            bar_phase: marker_phase(instant, bar_start, tock),
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn bar_start(&self) -> f64 {
        self.bar_start
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn bpb(&self) -> u32 {
        self.bpb
    }

    /// When this snapshot was taken.
    pub fn instant(&self) -> f64 {
        self.instant
    }

    pub fn beat(&self) -> i64 {
        self.beat
    }

    pub fn bar(&self) -> i64 {
        self.bar
    }

    pub fn tick_ms(&self) -> f64 {
        beat_ms(self.bpm)
    }

    pub fn tock_ms(&self) -> f64 {
        self.tick_ms() * f64::from(self.bpb)
    }

    pub fn beat_phase(&self) -> f64 {
        self.beat_phase
    }

    pub fn bar_phase(&self) -> f64 {
        self.bar_phase
    }

    /// Beat phase of an oscillator running at `ratio` of the beat rate.
    pub fn beat_phase_ratio(&self, ratio: Ratio) -> f64 {
        enhanced_phase(self.beat, self.beat_phase, ratio)
    }

    /// Bar phase of an oscillator running at `ratio` of the bar rate.
    pub fn bar_phase_ratio(&self, ratio: Ratio) -> f64 {
        enhanced_phase(self.bar, self.bar_phase, ratio)
    }

    pub fn phase(&self, interval: Interval, ratio: Ratio) -> f64 {
        match interval {
            Interval::Beat => self.beat_phase_ratio(ratio),
            Interval::Bar => self.bar_phase_ratio(ratio),
        }
    }

    /// Which beat of the current bar we are in, from 1 to `bpb`.
    pub fn beat_within_bar(&self) -> u32 {
        let beat = (self.bar_phase * f64::from(self.bpb)).floor() as u32;
        beat.min(self.bpb.saturating_sub(1)) + 1
    }

    pub fn is_downbeat(&self) -> bool {
        self.beat_within_bar() == 1
    }

    /// Musical position as `"bar.beat"`, e.g. `"12.3"`.
    pub fn marker(&self) -> String {
        format!("{}.{}", self.bar, self.beat_within_bar())
    }
}

#[derive(Deserialize)]
struct SnapshotParts {
    instant: f64,
    start: f64,
    bar_start: f64,
    bpm: f64,
    bpb: u32,
}

impl TryFrom<SnapshotParts> for Snapshot {
    type Error = RhythmError;

    fn try_from(parts: SnapshotParts) -> Result<Self> {
        Self::new(
            parts.instant,
            parts.start,
            parts.bar_start,
            parts.bpm,
            parts.bpb,
        )
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bar {} beat {}/{} ({:.2}) @ {:.1} BPM",
            self.bar,
            self.beat_within_bar(),
            self.bpb,
            self.beat_phase,
            self.bpm
        )
    }
}
