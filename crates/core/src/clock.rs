use std::sync::atomic::Ordering;

use portable_atomic::AtomicF64;

/// Source of wall-clock time in milliseconds.
///
/// The metronome never reads the system time directly; it asks its clock.
/// Tests and offline renderers inject a [`ManualClock`] to control "now".
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
}

/// Milliseconds since the Unix epoch, with sub-millisecond precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1000.0
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicF64,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: AtomicF64::new(start_ms),
        }
    }

    pub fn set(&self, ms: f64) {
        self.now.store(ms, Ordering::Release);
    }

    pub fn advance(&self, ms: f64) {
        self.now.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.load(Ordering::Acquire)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }
}
