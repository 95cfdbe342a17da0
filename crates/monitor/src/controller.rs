//! Detection loop controller
//!
//! Owns all frame-to-frame session state: the previous landmark set,
//! the eyes-closed episode, the detection throttle and the frame
//! counter. Each `tick` is one complete iteration; nothing else mutates
//! this state.

use crate::snapshot::MonitorSnapshot;
use crate::MonitorError;
use alarm::AlarmSynth;
use alerting::{AlertDispatcher, AlertKind, AlertRecord};
use camera_capture::FrameSource;
use dms::{
    analyze_face, DmsConfig, DriverState, EpisodePhase, EpisodeTracker, FrameAnalysis, Keypoint,
    LandmarkDetector, LostFacePolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Session-level options that are not detection thresholds
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub driver_id: String,
    /// Period of the scheduling loop in `run`
    pub frame_period: Duration,
    pub stop_alarm_on_eyes_open: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            driver_id: "driver-unknown".to_string(),
            frame_period: Duration::from_millis(16),
            stop_alarm_on_eyes_open: false,
        }
    }
}

/// Output of a fully analysed frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub analysis: FrameAnalysis,
    pub phase: EpisodePhase,
    pub eyes_closed_for: Duration,
    /// Alerts raised by this frame, in firing order
    pub alerts: Vec<AlertRecord>,
}

/// What one iteration did
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Too soon after the previous detection
    Throttled,
    /// Session not started, or the source/detector has nothing yet
    NotReady,
    /// Detector ran, no face in view
    NoFace,
    /// The detector or analysis failed on this frame
    DetectionFailed,
    Analyzed(FrameReport),
}

impl TickOutcome {
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            TickOutcome::Analyzed(report) => Some(report),
            _ => None,
        }
    }
}

/// Drives detection, analysis, escalation and the alarm for one driver
pub struct DrowsinessMonitor {
    config: DmsConfig,
    options: SessionOptions,
    source: Box<dyn FrameSource>,
    detector: Box<dyn LandmarkDetector>,
    alarm: Arc<AlarmSynth>,
    alerts: Option<AlertDispatcher>,
    episode: EpisodeTracker,
    previous: Option<Vec<Keypoint>>,
    last_detection: Option<Instant>,
    frame_count: u64,
    started: bool,
    snapshot: MonitorSnapshot,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
}

impl DrowsinessMonitor {
    pub fn new(
        config: DmsConfig,
        options: SessionOptions,
        source: Box<dyn FrameSource>,
        detector: Box<dyn LandmarkDetector>,
        alarm: Arc<AlarmSynth>,
    ) -> Result<Self, MonitorError> {
        config
            .validate()
            .map_err(|e| MonitorError::Config(e.to_string()))?;
        if options.frame_period.is_zero() {
            return Err(MonitorError::Config("frame period must be positive".into()));
        }
        let (snapshot_tx, _) = watch::channel(MonitorSnapshot::default());

        Ok(Self {
            episode: EpisodeTracker::new(config.warning_duration(), config.alarm_duration()),
            config,
            options,
            source,
            detector,
            alarm,
            alerts: None,
            previous: None,
            last_detection: None,
            frame_count: 0,
            started: false,
            snapshot: MonitorSnapshot::default(),
            snapshot_tx,
        })
    }

    /// Deliver alerts through `dispatcher` as well as returning them
    pub fn with_dispatcher(mut self, dispatcher: AlertDispatcher) -> Self {
        self.alerts = Some(dispatcher);
        self
    }

    /// Hand the dispatcher back, e.g. to drain it on shutdown
    pub fn take_dispatcher(&mut self) -> Option<AlertDispatcher> {
        self.alerts.take()
    }

    /// Open the camera and load the detector.
    ///
    /// Either failure is fatal to the session and leaves nothing held.
    pub async fn start(&mut self) -> Result<(), MonitorError> {
        if self.started {
            return Ok(());
        }
        if let Err(e) = self.source.open() {
            error!("Camera failed to open: {}", e);
            return Err(e.into());
        }
        if let Err(e) = self.detector.load().await {
            error!("Landmark detector failed to load: {}", e);
            self.source.release();
            return Err(MonitorError::Detector(e));
        }
        self.started = true;
        info!("Monitoring started for {}", self.options.driver_id);
        Ok(())
    }

    /// Run one loop iteration as of `now`
    pub async fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.started || !self.source.is_ready() || !self.detector.is_ready() {
            return TickOutcome::NotReady;
        }
        if let Some(last) = self.last_detection {
            if now.saturating_duration_since(last) < self.config.detection_interval() {
                return TickOutcome::Throttled;
            }
        }
        let Some(frame) = self.source.current_frame() else {
            return TickOutcome::NotReady;
        };
        self.last_detection = Some(now);

        let faces = match self.detector.estimate_faces(&frame).await {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Detection failed on frame {}: {}", frame.sequence, e);
                return TickOutcome::DetectionFailed;
            }
        };

        // Only the most prominent face is monitored
        let Some(face) = faces.into_iter().next() else {
            self.face_lost();
            return TickOutcome::NoFace;
        };

        let analysis = match analyze_face(&face, self.previous.as_deref(), &self.config) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Landmark analysis failed on frame {}: {}", frame.sequence, e);
                return TickOutcome::DetectionFailed;
            }
        };
        self.previous = Some(face.keypoints);
        self.frame_count += 1;

        TickOutcome::Analyzed(self.escalate(analysis, now))
    }

    fn escalate(&mut self, analysis: FrameAnalysis, now: Instant) -> FrameReport {
        let sleeping = analysis.state == DriverState::Sleeping;
        let update = self.episode.update(analysis.eyes_closed, sleeping, now);
        let driver_id = self.options.driver_id.as_str();

        let mut alerts: Vec<AlertRecord> = update
            .events
            .iter()
            .map(|event| AlertRecord::from_episode(driver_id, event, analysis.state))
            .collect();
        if analysis.state == DriverState::Tension {
            alerts.push(AlertRecord::new(
                driver_id,
                AlertKind::Tension,
                analysis.state,
                update.closed_for,
                0,
            ));
        }

        for record in &alerts {
            match record.alert_type {
                AlertKind::Tension => debug!("Tension on frame {}", self.frame_count),
                kind => warn!(
                    "{} alert: eyes closed {:.1}s (episode {}, state {})",
                    kind,
                    record.eye_closed_secs(),
                    record.episode,
                    record.driver_state
                ),
            }
            if record.alert_type.is_alarm() {
                self.alarm.play();
            }
            if let Some(dispatcher) = &self.alerts {
                dispatcher.dispatch(record.clone());
            }
        }

        if !analysis.eyes_closed && self.options.stop_alarm_on_eyes_open && self.alarm.is_playing() {
            info!("Eyes reopened, silencing alarm");
            self.alarm.stop();
        }

        if self.frame_count % self.config.log_every_n_frames == 0 {
            debug!(
                frame = self.frame_count,
                ear = analysis.ear,
                movement = analysis.movement,
                state = %analysis.state,
                closed_ms = update.closed_for.as_millis() as u64,
                "Frame analysed"
            );
        }

        self.publish(MonitorSnapshot {
            frame_count: self.frame_count,
            face_detected: true,
            left_ear: analysis.left_ear,
            right_ear: analysis.right_ear,
            ear: analysis.ear,
            movement: analysis.movement,
            driver_state: analysis.state,
            eyes_closed: analysis.eyes_closed,
            eyes_closed_duration: update.closed_for,
            phase: update.phase,
            alarm_active: self.alarm.is_playing(),
            last_alert: alerts.last().map(|r| r.alert_type).or(self.snapshot.last_alert),
        });

        FrameReport {
            analysis,
            phase: update.phase,
            eyes_closed_for: update.closed_for,
            alerts,
        }
    }

    fn face_lost(&mut self) {
        self.frame_count += 1;
        if self.config.lost_face_policy == LostFacePolicy::Reset {
            self.episode.reset();
        }
        if self.frame_count % self.config.log_every_n_frames == 0 {
            debug!(frame = self.frame_count, "No face detected");
        }

        // Frozen: the last measurements and closed duration stay as they were
        let mut snapshot = MonitorSnapshot {
            frame_count: self.frame_count,
            face_detected: false,
            alarm_active: self.alarm.is_playing(),
            ..self.snapshot.clone()
        };
        if self.config.lost_face_policy == LostFacePolicy::Reset {
            snapshot.eyes_closed = false;
            snapshot.eyes_closed_duration = Duration::ZERO;
            snapshot.phase = EpisodePhase::Open;
        }
        self.publish(snapshot);
    }

    fn publish(&mut self, snapshot: MonitorSnapshot) {
        self.snapshot = snapshot.clone();
        self.snapshot_tx.send_replace(snapshot);
    }

    /// End the session: silence the alarm, release the camera and return
    /// every timer and one-shot flag to its initial state.
    ///
    /// Idempotent, and safe on a monitor that never started.
    pub fn stop(&mut self) {
        self.alarm.stop();
        self.source.release();
        self.episode.reset();
        self.previous = None;
        self.last_detection = None;
        self.frame_count = 0;
        self.publish(MonitorSnapshot::default());
        if std::mem::replace(&mut self.started, false) {
            info!("Monitoring stopped for {}", self.options.driver_id);
        }
    }

    /// Cut the alarm without ending the session
    pub fn silence_alarm(&self) {
        self.alarm.stop();
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> &MonitorSnapshot {
        &self.snapshot
    }

    /// Receive every snapshot as it is published
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn alarm(&self) -> &Arc<AlarmSynth> {
        &self.alarm
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }
}
