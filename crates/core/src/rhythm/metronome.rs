use std::sync::atomic::{AtomicU32, Ordering};

use portable_atomic::AtomicF64;

use crate::clock::{Clock, SystemClock};
use crate::error::{validate_bpb, validate_bpm, validate_phase, Result};
use crate::rhythm::phase::{fract, marker_number, marker_phase, settle_origin};
use crate::rhythm::snapshot::Snapshot;

pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// Milliseconds per beat at `bpm`.
pub fn beat_ms(bpm: f64) -> f64 {
    60_000.0 / bpm
}

/// A continuously adjustable mapping from wall-clock time to beats and bars.
///
/// Implementors provide the four pieces of timing state and the setters that
/// mutate them; every query and the [`Snapshot`] capture are derived here so
/// all timing sources agree on the arithmetic.
pub trait Metro {
    /// Current time according to this metronome's clock.
    fn now_ms(&self) -> f64;

    /// Instant at which beat 1 begins.
    fn start(&self) -> f64;

    /// Instant at which bar 1 begins.
    fn bar_start(&self) -> f64;

    fn bpm(&self) -> f64;

    /// Beats per bar.
    fn bpb(&self) -> u32;

    /// Make the current instant the start of beat `start_beat` and snap bar
    /// boundaries onto the beat grid.
    fn set_start(&self, start_beat: i64);

    /// Make the current instant the start of bar `start_bar`, moving the beat
    /// grid along with it.
    fn set_bar_start(&self, start_bar: i64);

    /// Nudge both origins so the current beat phase becomes `phase`.
    fn set_beat_phase(&self, phase: f64) -> Result<()>;

    /// Nudge both origins so the current bar phase becomes `phase`.
    fn set_bar_phase(&self, phase: f64) -> Result<()>;

    /// Change tempo without moving the current beat or bar.
    fn set_bpm(&self, bpm: f64) -> Result<()>;

    /// Change the time signature without moving the current bar.
    fn set_bpb(&self, bpb: u32) -> Result<()>;

    /// Length of one beat in milliseconds.
    fn tick_ms(&self) -> f64 {
        beat_ms(self.bpm())
    }

    /// Length of one bar in milliseconds.
    fn tock_ms(&self) -> f64 {
        self.tick_ms() * f64::from(self.bpb())
    }

    fn beat(&self) -> i64 {
        marker_number(self.now_ms(), self.start(), self.tick_ms())
    }

    /// Instant at which beat `n` begins. Does not change any state.
    fn beat_time(&self, n: i64) -> f64 {
        self.start() + (n - 1) as f64 * self.tick_ms()
    }

    fn bar(&self) -> i64 {
        marker_number(self.now_ms(), self.bar_start(), self.tock_ms())
    }

    /// Instant at which bar `n` begins. Does not change any state.
    fn bar_time(&self, n: i64) -> f64 {
        self.bar_start() + (n - 1) as f64 * self.tock_ms()
    }

    fn beat_phase(&self) -> f64 {
        marker_phase(self.now_ms(), self.start(), self.tick_ms())
    }

    fn bar_phase(&self) -> f64 {
        marker_phase(self.now_ms(), self.bar_start(), self.tock_ms())
    }

    /// Freeze the timeline at a single instant.
    ///
    /// The clock is read once; every derived value in the snapshot comes from
    /// that one reading.
    fn snapshot(&self) -> Snapshot {
        let instant = self.now_ms();
        Snapshot::capture(
            instant,
            self.start(),
            self.bar_start(),
            self.bpm(),
            self.bpb(),
        )
    }
}

/// Shortest signed distance from `current` to `target` around the unit
/// circle, in `(-0.5, 0.5]`.
fn phase_delta(current: f64, target: f64) -> f64 {
    let delta = fract(target) - current;
    if delta > 0.5 {
        delta - 1.0
    } else if delta <= -0.5 {
        delta + 1.0
    } else {
        delta
    }
}

/// The authoritative timing source.
///
/// Each field is its own atomic so readers never block. Operations that touch
/// two fields (realignment, tempo and signature changes) update them one after
/// the other; a concurrent reader can observe the pair half-updated for the
/// duration of the call. Tempo changes are human-driven and rare next to the
/// per-frame reads, so a torn read costs at most one frame.
#[derive(Debug)]
pub struct Metronome<C: Clock = SystemClock> {
    clock: C,
    start: AtomicF64,
    bar_start: AtomicF64,
    bpm: AtomicF64,
    bpb: AtomicU32,
}

impl Metronome<SystemClock> {
    /// A metronome at `bpm` in 4/4 whose beat 1 and bar 1 begin now.
    pub fn new(bpm: f64) -> Result<Self> {
        Self::with_clock(bpm, SystemClock)
    }
}

impl<C: Clock> Metronome<C> {
    pub fn with_clock(bpm: f64, clock: C) -> Result<Self> {
        Self::with_signature(bpm, DEFAULT_BEATS_PER_BAR, clock)
    }

    pub fn with_signature(bpm: f64, bpb: u32, clock: C) -> Result<Self> {
        let bpm = validate_bpm(bpm)?;
        let bpb = validate_bpb(bpb)?;
        let now = clock.now_ms();

        log::info!("Metronome started at {:.2} BPM, {} beats per bar", bpm, bpb);

        Ok(Self {
            clock,
            start: AtomicF64::new(now),
            bar_start: AtomicF64::new(now),
            bpm: AtomicF64::new(bpm),
            bpb: AtomicU32::new(bpb),
        })
    }

    /// Make the current instant beat 1 of bar 1.
    pub fn reset(&self) {
        self.set_start(1);
    }

    /// How far to move `origin` earlier so the marker phase at now becomes
    /// `target`, taking the short way round. Returns the phase delta and the
    /// shift in milliseconds.
    fn realign(&self, origin: f64, interval: f64, target: f64) -> (f64, f64) {
        let now = self.now_ms();
        let marker = marker_number(now, origin, interval);
        let current = marker_phase(now, origin, interval);
        let delta = phase_delta(current, target);

        // Crossing a marker boundary lands in the neighbouring marker.
        let target = fract(target);
        let marker = marker + (current + delta - target).round() as i64;

        let position = (marker - 1) as f64 + target;
        let moved = settle_origin(now, now - position * interval, interval, marker);
        (delta, origin - moved)
    }
}

impl<C: Clock> Metro for Metronome<C> {
    fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    fn start(&self) -> f64 {
        self.start.load(Ordering::Acquire)
    }

    fn bar_start(&self) -> f64 {
        self.bar_start.load(Ordering::Acquire)
    }

    fn bpm(&self) -> f64 {
        self.bpm.load(Ordering::Acquire)
    }

    fn bpb(&self) -> u32 {
        self.bpb.load(Ordering::Acquire)
    }

    fn set_start(&self, start_beat: i64) {
        let now = self.now_ms();
        let tick = self.tick_ms();
        let start_bar = (start_beat - 1).div_euclid(i64::from(self.bpb())) + 1;
        let origin = settle_origin(now, now - (start_beat - 1) as f64 * tick, tick, start_beat);
        let origin = settle_origin(now, origin, self.tock_ms(), start_bar);
        self.start.store(origin, Ordering::Release);
        self.bar_start.store(origin, Ordering::Release);
        log::info!("Realigned: beat {} starts now", start_beat);
    }

    fn set_bar_start(&self, start_bar: i64) {
        let now = self.now_ms();
        let tock = self.tock_ms();
        let start_beat = (start_bar - 1) * i64::from(self.bpb()) + 1;
        let origin = settle_origin(now, now - (start_bar - 1) as f64 * tock, tock, start_bar);
        let origin = settle_origin(now, origin, self.tick_ms(), start_beat);
        self.bar_start.store(origin, Ordering::Release);
        self.start.store(origin, Ordering::Release);
        log::info!("Realigned: bar {} starts now", start_bar);
    }

    fn set_beat_phase(&self, phase: f64) -> Result<()> {
        let target = validate_phase(phase)?;
        let (delta, shift) = self.realign(self.start(), self.tick_ms(), target);
        self.start.fetch_sub(shift, Ordering::AcqRel);
        self.bar_start.fetch_sub(shift, Ordering::AcqRel);
        log::debug!("Beat phase nudged by {:+.4} ({:+.2} ms)", delta, shift);
        Ok(())
    }

    fn set_bar_phase(&self, phase: f64) -> Result<()> {
        let target = validate_phase(phase)?;
        let (delta, shift) = self.realign(self.bar_start(), self.tock_ms(), target);
        self.bar_start.fetch_sub(shift, Ordering::AcqRel);
        self.start.fetch_sub(shift, Ordering::AcqRel);
        log::debug!("Bar phase nudged by {:+.4} ({:+.2} ms)", delta, shift);
        Ok(())
    }

    fn set_bpm(&self, bpm: f64) -> Result<()> {
        let new_bpm = validate_bpm(bpm)?;
        let now = self.now_ms();
        let old_bpm = self.bpm();
        let bpb = f64::from(self.bpb());

        // Position in beats and bars as of now, under the old tempo.
        let old_tick = beat_ms(old_bpm);
        let beats = (now - self.start()) / old_tick;
        let bars = (now - self.bar_start()) / (old_tick * bpb);

        let beat = marker_number(now, self.start(), old_tick);
        let bar = marker_number(now, self.bar_start(), old_tick * bpb);

        // Pivot the timeline around now so that position carries over.
        let new_tick = beat_ms(new_bpm);
        let new_tock = new_tick * bpb;
        let start = settle_origin(now, now - beats * new_tick, new_tick, beat);
        let bar_start = settle_origin(now, now - bars * new_tock, new_tock, bar);
        self.start.store(start, Ordering::Release);
        self.bar_start.store(bar_start, Ordering::Release);
        self.bpm.store(new_bpm, Ordering::Release);

        log::info!("Tempo changed from {:.2} to {:.2} BPM", old_bpm, new_bpm);
        Ok(())
    }

    fn set_bpb(&self, bpb: u32) -> Result<()> {
        let new_bpb = validate_bpb(bpb)?;
        let old_bpb = self.bpb();
        if new_bpb == old_bpb {
            return Ok(());
        }

        let now = self.now_ms();
        let tick = self.tick_ms();
        let bar = marker_number(now, self.bar_start(), self.tock_ms());
        let mut bar_began = self.bar_time(bar);

        // When shrinking the bar past the beat we are in, that beat becomes
        // the last one of the current bar.
        let beats_in = ((now - bar_began) / tick).floor().max(0.0);
        let keep = beats_in.min(f64::from(new_bpb - 1));
        bar_began += (beats_in - keep) * tick;

        let new_tock = tick * f64::from(new_bpb);
        let bar_start = bar_began - (bar - 1) as f64 * new_tock;
        self.bar_start.store(settle_origin(now, bar_start, new_tock, bar), Ordering::Release);
        self.bpb.store(new_bpb, Ordering::Release);

        log::info!(
            "Time signature changed from {} to {} beats per bar",
            old_bpb,
            new_bpb
        );
        Ok(())
    }
}
