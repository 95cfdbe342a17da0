//! Drowsiness Alarm
//!
//! Plays a bounded, cancelable pattern of paired beeps through an
//! [`AudioOutput`]. At most one playback runs at a time.

mod output;
mod synth;
mod tone;

pub use output::{AudioOutput, PcmOutput, ToneVoice, TracingOutput};
pub use synth::{AlarmConfig, AlarmSynth};
pub use tone::Tone;

use thiserror::Error;

/// Audio errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio device unavailable: {0}")]
    Device(String),

    #[error("Audio voice already closed")]
    Closed,
}
