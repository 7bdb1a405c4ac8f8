//! Musical timing for frame-driven renderers.
//!
//! A [`Metronome`] maps wall-clock time onto beats and bars and can be
//! retuned while running without the beat count jumping. Once per frame a
//! control loop calls [`Metro::snapshot`] and hands the resulting
//! [`Snapshot`] to every effect, so they all agree on one instant.

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ConfigFile, ConfigManager, ConfigOption, ConfigSchema, Settings};
pub use effect::effect::{
    get_effect_phase, sawtooth_effect, sine_effect, square_effect, triangle_effect, Effect,
    EffectParams, EffectType,
};
pub use error::{Result, RhythmError};
pub use rhythm::metronome::{beat_ms, Metro, Metronome, DEFAULT_BEATS_PER_BAR};
pub use rhythm::phase::{enhanced_phase, fract, marker_number, marker_phase, Ratio};
pub use rhythm::snapshot::{Interval, Snapshot};
pub use rhythm::tap::TapTempo;

mod clock;
mod config;
mod effect;
mod error;
mod rhythm;
