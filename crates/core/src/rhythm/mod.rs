pub mod metronome;
pub mod phase;
pub mod snapshot;
pub mod tap;
