//! Audio output seam and the built-in outputs

use crate::{AudioError, Tone};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Something that can produce tones, e.g. a sound card.
pub trait AudioOutput: Send + Sync {
    /// Acquire a voice for one playback session
    fn open(&self) -> Result<Box<dyn ToneVoice>, AudioError>;
}

/// An open synthesis resource, owned by one playback session
pub trait ToneVoice: Send {
    /// Begin sounding a tone
    fn start(&mut self, tone: &Tone) -> Result<(), AudioError>;

    /// Cut the current tone
    fn silence(&mut self) -> Result<(), AudioError>;

    /// Release the resource. Further calls fail with `AudioError::Closed`.
    fn close(&mut self) -> Result<(), AudioError>;
}

/// Renders every tone into a shared PCM buffer
#[derive(Debug, Clone)]
pub struct PcmOutput {
    sample_rate: u32,
    samples: Arc<Mutex<Vec<f32>>>,
    opens: Arc<AtomicUsize>,
}

impl PcmOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Arc::new(Mutex::new(Vec::new())),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Copy of everything rendered so far
    pub fn samples(&self) -> Vec<f32> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Voices handed out, i.e. playback sessions started
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl AudioOutput for PcmOutput {
    fn open(&self) -> Result<Box<dyn ToneVoice>, AudioError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(PcmVoice {
            sample_rate: self.sample_rate,
            samples: Arc::clone(&self.samples),
            closed: false,
        }))
    }
}

struct PcmVoice {
    sample_rate: u32,
    samples: Arc<Mutex<Vec<f32>>>,
    closed: bool,
}

impl ToneVoice for PcmVoice {
    fn start(&mut self, tone: &Tone) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }
        let rendered = tone.render(self.sample_rate);
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(rendered);
        Ok(())
    }

    fn silence(&mut self) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }
        self.closed = true;
        Ok(())
    }
}

/// Logs tone events instead of making sound
#[derive(Debug, Default, Clone)]
pub struct TracingOutput;

impl AudioOutput for TracingOutput {
    fn open(&self) -> Result<Box<dyn ToneVoice>, AudioError> {
        info!("Alarm voice opened");
        Ok(Box::new(TracingVoice { closed: false }))
    }
}

struct TracingVoice {
    closed: bool,
}

impl ToneVoice for TracingVoice {
    fn start(&mut self, tone: &Tone) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }
        debug!(
            "BEEP {:.0}Hz for {}ms at gain {:.2}",
            tone.frequency_hz,
            tone.duration.as_millis(),
            tone.gain
        );
        Ok(())
    }

    fn silence(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if std::mem::replace(&mut self.closed, true) {
            return Err(AudioError::Closed);
        }
        info!("Alarm voice closed");
        Ok(())
    }
}
