use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the timing engine.
#[derive(Debug, Error)]
pub enum RhythmError {
    /// A setter or constructor was handed a value outside its domain.
    /// The receiver is left untouched.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, RhythmError>;

pub(crate) fn validate_bpm(bpm: f64) -> Result<f64> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(RhythmError::InvalidArgument(format!(
            "bpm must be a positive finite number, got {}",
            bpm
        )))
    }
}

pub(crate) fn validate_bpb(bpb: u32) -> Result<u32> {
    if bpb > 0 {
        Ok(bpb)
    } else {
        Err(RhythmError::InvalidArgument(
            "beats per bar must be at least 1".to_string(),
        ))
    }
}

pub(crate) fn validate_phase(phase: f64) -> Result<f64> {
    if phase.is_finite() {
        Ok(phase)
    } else {
        Err(RhythmError::InvalidArgument(format!(
            "phase must be finite, got {}",
            phase
        )))
    }
}
