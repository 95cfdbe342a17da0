//! Beep-pattern alarm playback

use crate::{AudioOutput, Tone, ToneVoice};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Alarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Beep frequency (Hz)
    pub tone_hz: f32,
    /// Length of each beep (milliseconds)
    pub beep_ms: u64,
    /// Silence between the two beeps of a pair (milliseconds)
    pub gap_ms: u64,
    /// Silence after each pair (milliseconds)
    pub pause_ms: u64,
    /// Number of beep pairs
    pub cycles: u32,
    /// Hard ceiling on one playback session (seconds)
    pub max_duration_sec: u64,
    /// Peak gain, 0..1
    pub gain: f32,
    pub attack_ms: u64,
    pub release_ms: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            tone_hz: 800.0,
            beep_ms: 200,
            gap_ms: 100,
            pause_ms: 500,
            cycles: 10,
            max_duration_sec: 10,
            gain: 0.5,
            attack_ms: 10,
            release_ms: 20,
        }
    }
}

impl AlarmConfig {
    pub fn beep(&self) -> Tone {
        Tone {
            frequency_hz: self.tone_hz,
            duration: Duration::from_millis(self.beep_ms),
            gain: self.gain.clamp(0.0, 1.0),
            attack: Duration::from_millis(self.attack_ms),
            release: Duration::from_millis(self.release_ms),
        }
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_sec)
    }
}

type SharedVoice = Arc<Mutex<Box<dyn ToneVoice>>>;

struct Playback {
    id: u64,
    voice: SharedVoice,
    task: JoinHandle<()>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn close_voice(voice: &SharedVoice) {
    if let Err(e) = lock(voice).close() {
        debug!("Ignoring error while closing alarm voice: {}", e);
    }
}

/// Plays the alarm pattern; one session at a time.
///
/// Playback runs on a tokio task, so `play` must be called from inside
/// a runtime.
pub struct AlarmSynth {
    config: AlarmConfig,
    output: Arc<dyn AudioOutput>,
    active: Arc<Mutex<Option<Playback>>>,
    sessions: AtomicU64,
}

impl AlarmSynth {
    pub fn new(config: AlarmConfig, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            config,
            output,
            active: Arc::new(Mutex::new(None)),
            sessions: AtomicU64::new(0),
        }
    }

    /// Start the alarm unless it is already sounding.
    ///
    /// Returns true if a new playback session started.
    pub fn play(&self) -> bool {
        let mut active = lock(&self.active);
        if active.is_some() {
            debug!("Alarm already playing");
            return false;
        }

        let voice = match self.output.open() {
            Ok(voice) => Arc::new(Mutex::new(voice)),
            Err(e) => {
                warn!("Alarm could not open audio output: {}", e);
                return false;
            }
        };

        let id = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        let task = tokio::spawn(run_session(
            self.config.clone(),
            Arc::clone(&voice),
            Arc::clone(&self.active),
            id,
        ));
        *active = Some(Playback { id, voice, task });
        info!("Alarm playing ({} Hz, up to {}s)", self.config.tone_hz, self.config.max_duration_sec);
        true
    }

    /// Stop the alarm and release the voice. Safe to call at any time.
    pub fn stop(&self) {
        let playback = lock(&self.active).take();
        if let Some(playback) = playback {
            playback.task.abort();
            close_voice(&playback.voice);
            info!("Alarm stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Playback sessions started over the synth's lifetime
    pub fn sessions_started(&self) -> u64 {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &AlarmConfig {
        &self.config
    }
}

impl Drop for AlarmSynth {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_session(
    config: AlarmConfig,
    voice: SharedVoice,
    active: Arc<Mutex<Option<Playback>>>,
    id: u64,
) {
    let pattern = beep_pattern(&config, &voice);
    if tokio::time::timeout(config.max_duration(), pattern).await.is_err() {
        info!("Alarm reached its {}s ceiling", config.max_duration_sec);
    }

    // Only release the session if `stop` has not already taken it
    let mut guard = lock(&active);
    if guard.as_ref().map(|p| p.id) == Some(id) {
        guard.take();
        drop(guard);
        close_voice(&voice);
        debug!("Alarm session {} finished", id);
    }
}

async fn beep_pattern(config: &AlarmConfig, voice: &SharedVoice) {
    let tone = config.beep();
    let gap = Duration::from_millis(config.gap_ms);
    let pause = Duration::from_millis(config.pause_ms);

    for _ in 0..config.cycles {
        beep(voice, &tone).await;
        tokio::time::sleep(gap).await;
        beep(voice, &tone).await;
        tokio::time::sleep(pause).await;
    }
}

async fn beep(voice: &SharedVoice, tone: &Tone) {
    if let Err(e) = lock(voice).start(tone) {
        warn!("Alarm tone failed to start: {}", e);
    }
    tokio::time::sleep(tone.duration).await;
    if let Err(e) = lock(voice).silence() {
        debug!("Alarm tone failed to stop: {}", e);
    }
}
