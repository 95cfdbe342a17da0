//! End-to-end runs of the monitor against scripted drivers.
//!
//! Detections are driven at explicit 100ms instants so frame `i` is
//! always `i * 100ms` into the session.

use crate::{DrowsinessMonitor, MonitorError, SessionOptions, TickOutcome};
use alarm::{AlarmConfig, AlarmSynth, PcmOutput};
use alerting::{AlertDispatcher, AlertKind, DispatcherConfig, MemorySink};
use camera_capture::{CameraConfig, CameraError, SyntheticSource};
use dms::{DmsConfig, DriverState, EpisodePhase, FaceScript, LostFacePolicy, SyntheticFaceDetector};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const STEP: Duration = Duration::from_millis(100);

struct Rig {
    monitor: DrowsinessMonitor,
    audio: PcmOutput,
    t0: Instant,
    next: u32,
}

impl Rig {
    fn new(script: FaceScript) -> Self {
        Self::with(script, DmsConfig::default(), SessionOptions::default())
    }

    fn with(script: FaceScript, config: DmsConfig, options: SessionOptions) -> Self {
        let audio = PcmOutput::new(8000);
        let alarm = Arc::new(AlarmSynth::new(AlarmConfig::default(), Arc::new(audio.clone())));
        let monitor = DrowsinessMonitor::new(
            config,
            options,
            Box::new(SyntheticSource::default()),
            Box::new(SyntheticFaceDetector::new(script)),
            alarm,
        )
        .unwrap();
        Self {
            monitor,
            audio,
            t0: Instant::now(),
            next: 0,
        }
    }

    async fn started(mut self) -> Self {
        self.monitor.start().await.unwrap();
        self
    }

    /// Drive `n` more detections, one per 100ms
    async fn frames(&mut self, n: u32) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..n {
            let now = self.t0 + STEP * self.next;
            self.next += 1;
            outcomes.push(self.monitor.tick(now).await);
        }
        outcomes
    }
}

/// (frame index, alert kind) for every alert raised
fn alerts(outcomes: &[TickOutcome]) -> Vec<(usize, AlertKind)> {
    outcomes
        .iter()
        .enumerate()
        .filter_map(|(i, outcome)| outcome.report().map(|report| (i, report)))
        .flat_map(|(i, report)| report.alerts.iter().map(move |alert| (i, alert.alert_type)))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_four_second_closure_warns_without_alarm() {
    let mut rig = Rig::new(FaceScript::new().face(20, 0.35).face(40, 0.15))
        .started()
        .await;
    let outcomes = rig.frames(60).await;

    assert!(outcomes.iter().all(|o| o.report().is_some()));
    assert_eq!(alerts(&outcomes), vec![(50, AlertKind::Warning)]);

    let mut last = Duration::ZERO;
    for (i, outcome) in outcomes.iter().enumerate() {
        let report = outcome.report().unwrap();
        if i < 20 {
            assert!(!report.analysis.eyes_closed);
            assert_eq!(report.eyes_closed_for, Duration::ZERO);
        } else {
            assert!(report.analysis.eyes_closed);
            assert!(report.eyes_closed_for >= last);
            last = report.eyes_closed_for;
        }
    }
    assert_eq!(last, Duration::from_millis(3900));

    let snapshot = rig.monitor.snapshot();
    assert!(snapshot.face_detected);
    assert_eq!(snapshot.frame_count, 60);
    assert_eq!(snapshot.phase, EpisodePhase::ClosedWarning);
    assert!(!snapshot.alarm_active);
    assert_eq!(rig.audio.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_seven_second_closure_sounds_alarm_once() {
    let mut rig = Rig::new(FaceScript::new().face(20, 0.35).face(70, 0.15))
        .started()
        .await;
    let outcomes = rig.frames(90).await;

    assert_eq!(
        alerts(&outcomes),
        vec![(50, AlertKind::Warning), (70, AlertKind::Alarm)]
    );
    let alarm = outcomes[70].report().unwrap();
    assert_eq!(alarm.eyes_closed_for, Duration::from_secs(5));
    assert_eq!(alarm.phase, EpisodePhase::ClosedAlarm);

    assert!(rig.monitor.snapshot().alarm_active);
    assert_eq!(rig.monitor.snapshot().last_alert, Some(AlertKind::Alarm));
    assert_eq!(rig.audio.opens(), 1);
    assert_eq!(rig.monitor.alarm().sessions_started(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reopening_starts_a_fresh_episode() {
    let script = FaceScript::new()
        .face(20, 0.35)
        .face(60, 0.15)
        .face(10, 0.35)
        .face(40, 0.15);
    let mut rig = Rig::new(script).started().await;
    let outcomes = rig.frames(130).await;

    assert_eq!(
        alerts(&outcomes),
        vec![
            (50, AlertKind::Warning),
            (70, AlertKind::Alarm),
            (120, AlertKind::Warning),
        ]
    );
    assert_eq!(outcomes[80].report().unwrap().phase, EpisodePhase::Open);
    assert_eq!(outcomes[90].report().unwrap().eyes_closed_for, Duration::ZERO);
    assert_eq!(rig.audio.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_detections_are_throttled() {
    let mut rig = Rig::new(FaceScript::new().face(5, 0.35)).started().await;
    let t0 = rig.t0;

    assert!(rig.monitor.tick(t0).await.report().is_some());
    assert!(matches!(
        rig.monitor.tick(t0 + Duration::from_millis(16)).await,
        TickOutcome::Throttled
    ));
    assert!(matches!(
        rig.monitor.tick(t0 + Duration::from_millis(99)).await,
        TickOutcome::Throttled
    ));
    assert!(rig.monitor.tick(t0 + STEP).await.report().is_some());
    assert_eq!(rig.monitor.snapshot().frame_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_before_start() {
    let mut rig = Rig::new(FaceScript::new().face(5, 0.35));
    assert!(matches!(rig.frames(1).await[0], TickOutcome::NotReady));
    assert!(!rig.monitor.is_started());
    assert_eq!(rig.monitor.snapshot().frame_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_camera_denied_fails_start() {
    let alarm = Arc::new(AlarmSynth::new(AlarmConfig::default(), Arc::new(PcmOutput::new(8000))));
    let mut monitor = DrowsinessMonitor::new(
        DmsConfig::default(),
        SessionOptions::default(),
        Box::new(SyntheticSource::denied(CameraConfig::cabin())),
        Box::new(SyntheticFaceDetector::new(FaceScript::new())),
        alarm,
    )
    .unwrap();

    let result = monitor.start().await;
    assert!(matches!(
        result,
        Err(MonitorError::Camera(CameraError::PermissionDenied))
    ));
    assert!(!monitor.is_started());
}

#[tokio::test(start_paused = true)]
async fn test_detector_unavailable_fails_start() {
    let alarm = Arc::new(AlarmSynth::new(AlarmConfig::default(), Arc::new(PcmOutput::new(8000))));
    let mut monitor = DrowsinessMonitor::new(
        DmsConfig::default(),
        SessionOptions::default(),
        Box::new(SyntheticSource::default()),
        Box::new(SyntheticFaceDetector::unavailable()),
        alarm,
    )
    .unwrap();

    assert!(matches!(monitor.start().await, Err(MonitorError::Detector(_))));
    assert!(matches!(monitor.tick(Instant::now()).await, TickOutcome::NotReady));
}

#[test]
fn test_invalid_config_rejected() {
    let config = DmsConfig {
        ear_sleeping_threshold: 0.3,
        ..Default::default()
    };
    let alarm = Arc::new(AlarmSynth::new(AlarmConfig::default(), Arc::new(PcmOutput::new(8000))));
    let result = DrowsinessMonitor::new(
        config,
        SessionOptions::default(),
        Box::new(SyntheticSource::default()),
        Box::new(SyntheticFaceDetector::new(FaceScript::new())),
        alarm,
    );
    assert!(matches!(result, Err(MonitorError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn test_detector_failures_do_not_end_the_session() {
    let script = FaceScript::new().face(2, 0.35).failing(3).face(2, 0.35);
    let mut rig = Rig::new(script).started().await;
    let outcomes = rig.frames(7).await;

    assert!(outcomes[2..5]
        .iter()
        .all(|o| matches!(o, TickOutcome::DetectionFailed)));
    assert!(outcomes[5].report().is_some());
    assert!(outcomes[6].report().is_some());
    assert_eq!(rig.monitor.snapshot().frame_count, 4);
    assert!(rig.monitor.snapshot().face_detected);
}

#[tokio::test(start_paused = true)]
async fn test_lost_face_freezes_the_episode() {
    let script = FaceScript::new()
        .face(20, 0.35)
        .face(20, 0.15)
        .no_face(10)
        .face(20, 0.15);
    let mut rig = Rig::new(script).started().await;

    rig.frames(40).await;
    let before = rig.monitor.snapshot().clone();
    assert_eq!(before.eyes_closed_duration, Duration::from_millis(1900));

    let gap = rig.frames(10).await;
    assert!(gap.iter().all(|o| matches!(o, TickOutcome::NoFace)));
    let frozen = rig.monitor.snapshot();
    assert!(!frozen.face_detected);
    assert_eq!(frozen.eyes_closed_duration, before.eyes_closed_duration);
    assert_eq!(frozen.ear, before.ear);
    assert!(frozen.eyes_closed);

    // Time kept running while the face was out of view
    let resumed = rig.frames(20).await;
    assert_eq!(
        resumed[0].report().unwrap().eyes_closed_for,
        Duration::from_secs(3)
    );
    assert_eq!(alerts(&resumed), vec![(0, AlertKind::Warning)]);
}

#[tokio::test(start_paused = true)]
async fn test_lost_face_reset_policy_restarts_timing() {
    let script = FaceScript::new()
        .face(20, 0.35)
        .face(20, 0.15)
        .no_face(10)
        .face(20, 0.15);
    let config = DmsConfig {
        lost_face_policy: LostFacePolicy::Reset,
        ..Default::default()
    };
    let mut rig = Rig::with(script, config, SessionOptions::default())
        .started()
        .await;

    rig.frames(40).await;
    rig.frames(10).await;
    let snapshot = rig.monitor.snapshot();
    assert!(!snapshot.face_detected);
    assert_eq!(snapshot.eyes_closed_duration, Duration::ZERO);
    assert_eq!(snapshot.phase, EpisodePhase::Open);

    let resumed = rig.frames(20).await;
    assert_eq!(resumed[0].report().unwrap().eyes_closed_for, Duration::ZERO);
    assert!(alerts(&resumed).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_head_movement_with_open_eyes_is_tension() {
    let mut rig = Rig::new(FaceScript::new().moving(5, 0.32, 5.0)).started().await;
    let outcomes = rig.frames(5).await;

    let first = outcomes[0].report().unwrap();
    assert_eq!(first.analysis.movement, 0.0);
    assert_eq!(first.analysis.state, DriverState::Active);

    for outcome in &outcomes[1..] {
        let report = outcome.report().unwrap();
        assert!((report.analysis.movement - 5.0).abs() < 1e-3);
        assert_eq!(report.analysis.state, DriverState::Tension);
    }
    let kinds = alerts(&outcomes);
    assert_eq!(kinds.len(), 4);
    assert!(kinds.iter().all(|(_, kind)| *kind == AlertKind::Tension));
    assert_eq!(rig.audio.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sleeping_raises_alarm_immediately() {
    let mut rig = Rig::new(FaceScript::new().face(1, 0.35).face(40, 0.08))
        .started()
        .await;
    let outcomes = rig.frames(41).await;

    // The 3s warning crossing is still reported after the early alarm
    assert_eq!(
        alerts(&outcomes),
        vec![(1, AlertKind::Sleeping), (31, AlertKind::Warning)]
    );
    assert_eq!(outcomes[1].report().unwrap().analysis.state, DriverState::Sleeping);
    assert!(rig.monitor.alarm().is_playing());
    assert_eq!(rig.audio.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_alarm_can_stop_when_eyes_reopen() {
    let options = SessionOptions {
        stop_alarm_on_eyes_open: true,
        ..Default::default()
    };
    let script = FaceScript::new().face(1, 0.35).face(2, 0.08).face(1, 0.35);
    let mut rig = Rig::with(script, DmsConfig::default(), options).started().await;

    rig.frames(3).await;
    assert!(rig.monitor.alarm().is_playing());
    rig.frames(1).await;
    assert!(!rig.monitor.alarm().is_playing());
    assert!(!rig.monitor.snapshot().alarm_active);
}

#[tokio::test(start_paused = true)]
async fn test_alarm_keeps_playing_after_reopen_by_default() {
    let script = FaceScript::new().face(1, 0.35).face(2, 0.08).face(1, 0.35);
    let mut rig = Rig::new(script).started().await;

    rig.frames(4).await;
    assert!(rig.monitor.alarm().is_playing());
    rig.monitor.silence_alarm();
    assert!(!rig.monitor.alarm().is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_stop_resets_session_and_is_idempotent() {
    let mut rig = Rig::new(FaceScript::new().face(1, 0.35).face(5, 0.08))
        .started()
        .await;
    rig.frames(3).await;
    assert!(rig.monitor.alarm().is_playing());

    rig.monitor.stop();
    rig.monitor.stop();
    assert!(!rig.monitor.is_started());
    assert!(!rig.monitor.alarm().is_playing());
    assert_eq!(*rig.monitor.snapshot(), Default::default());
    assert!(matches!(rig.frames(1).await[0], TickOutcome::NotReady));
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_start_is_harmless() {
    let mut rig = Rig::new(FaceScript::new());
    rig.monitor.stop();
    assert!(!rig.monitor.is_started());
    assert_eq!(rig.audio.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_snapshots_are_published_per_iteration() {
    let mut rig = Rig::new(FaceScript::new().face(2, 0.3)).started().await;
    let mut rx = rig.monitor.subscribe();

    rig.frames(1).await;
    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.frame_count, 1);
    assert!((snapshot.ear - 0.3).abs() < 1e-4);
    assert!((snapshot.left_ear - snapshot.right_ear).abs() < 1e-4);

    // Throttled ticks publish nothing
    rig.monitor.tick(rig.t0 + Duration::from_millis(10)).await;
    assert!(!rx.has_changed().unwrap());

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["driver_state"], "active");
    assert_eq!(json["face_detected"], true);
}

#[tokio::test(start_paused = true)]
async fn test_alerts_reach_the_dispatcher() {
    let sink = MemorySink::new();
    let dispatcher = AlertDispatcher::spawn(Arc::new(sink.clone()), DispatcherConfig::default());
    let options = SessionOptions {
        driver_id: "bus-7".to_string(),
        ..Default::default()
    };
    let script = FaceScript::new().face(20, 0.35).face(70, 0.15);
    let mut rig = Rig::with(script, DmsConfig::default(), options).started().await;
    rig.monitor = rig.monitor.with_dispatcher(dispatcher);

    rig.frames(90).await;
    let dispatcher = rig.monitor.take_dispatcher().unwrap();
    dispatcher.close().await;

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].alert_type, AlertKind::Warning);
    assert_eq!(records[1].alert_type, AlertKind::Alarm);
    assert!(records.iter().all(|r| r.driver_id == "bus-7" && r.episode == 1));
    assert_eq!(records[1].eye_closed_secs(), 5.0);
}

#[tokio::test(start_paused = true)]
async fn test_spawned_loop_runs_until_stopped() {
    let rig = Rig::new(FaceScript::new().face(100, 0.35));
    let handle = rig.monitor.spawn();

    tokio::time::sleep(Duration::from_secs(3)).await;
    let snapshot = handle.snapshot();
    assert!(snapshot.face_detected);
    // 16ms ticks with a 100ms throttle: one detection every 112ms
    assert!((20..=31).contains(&snapshot.frame_count));

    handle.stop();
    handle.stop();
    let monitor = handle.join().await.unwrap();
    assert!(!monitor.is_started());
    assert_eq!(*monitor.snapshot(), Default::default());
}

#[tokio::test(start_paused = true)]
async fn test_spawned_loop_reports_start_failure() {
    let alarm = Arc::new(AlarmSynth::new(AlarmConfig::default(), Arc::new(PcmOutput::new(8000))));
    let monitor = DrowsinessMonitor::new(
        DmsConfig::default(),
        SessionOptions::default(),
        Box::new(SyntheticSource::denied(CameraConfig::cabin())),
        Box::new(SyntheticFaceDetector::new(FaceScript::new())),
        alarm,
    )
    .unwrap();

    let handle = monitor.spawn();
    assert!(matches!(handle.join().await, Err(MonitorError::Camera(_))));
}
