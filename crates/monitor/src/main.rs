//! Drowsiness Monitor - Demo Entry Point
//!
//! Runs the full loop against the synthetic camera and a scripted face.
//! Usage: `drowsiness-monitor [settings.toml]`

use alarm::{AlarmSynth, TracingOutput};
use alerting::{AlertDispatcher, LogSink};
use camera_capture::{CameraConfig, SyntheticSource};
use dms::{FaceScript, LandmarkDetector, SyntheticFaceDetector};
use monitor::{init_logging, DrowsinessMonitor, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Extra time after the last scripted detection
const SCENARIO_SLACK: Duration = Duration::from_millis(500);

/// Alert, look down, doze off, wake up
fn demo_script() -> FaceScript {
    FaceScript::new()
        .face(20, 0.32)
        .moving(5, 0.30, 6.0)
        .face(15, 0.31)
        .face(40, 0.17)
        .face(10, 0.30)
        .face(70, 0.16)
        .no_face(5)
        .face(20, 0.33)
}

/// Face-mesh model when one is configured and compiled in, else the script
fn landmark_detector(settings: &Settings, script: FaceScript) -> Box<dyn LandmarkDetector> {
    #[cfg(feature = "onnx")]
    {
        if let Some(path) = &settings.monitor.face_model_path {
            info!("Using ONNX face mesh at {}", path);
            return Box::new(dms::OnnxFaceMesh::new(path.as_str()));
        }
    }
    Box::new(
        SyntheticFaceDetector::new(script)
            .with_eyes(settings.monitor.left_eye, settings.monitor.right_eye),
    )
}

/// How long to let a script of `detections` steps play out, with slack
/// for the last frame. Saturates instead of overflowing on huge scripts.
fn scenario_runtime(detections: usize, detection_period: Duration) -> Duration {
    u32::try_from(detections)
        .ok()
        .and_then(|n| detection_period.checked_mul(n))
        .unwrap_or(Duration::MAX)
        .saturating_add(SCENARIO_SLACK)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(settings_path.as_deref())?;
    init_logging(&settings.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Thresholds: EAR closed < {}, sleeping < {}, warning {}s, alarm {}s",
        settings.monitor.ear_closed_threshold,
        settings.monitor.ear_sleeping_threshold,
        settings.monitor.warning_duration_sec,
        settings.monitor.alarm_duration_sec
    );

    let script = match &settings.session.scenario_path {
        Some(path) => FaceScript::from_file(path)?,
        None => demo_script(),
    };
    let detections = script.len();
    let detector = landmark_detector(&settings, script);

    let source = SyntheticSource::new(CameraConfig {
        width: settings.session.camera_width,
        height: settings.session.camera_height,
        ..CameraConfig::cabin()
    });
    let alarm = Arc::new(AlarmSynth::new(settings.alarm.clone(), Arc::new(TracingOutput)));
    let dispatcher = AlertDispatcher::spawn(Arc::new(LogSink), settings.alerts.clone());

    let options = settings.session.options();
    let detection_period = settings.monitor.detection_interval() + options.frame_period;
    let monitor = DrowsinessMonitor::new(
        settings.monitor.clone(),
        options,
        Box::new(source),
        detector,
        alarm,
    )?
    .with_dispatcher(dispatcher);

    let handle = monitor.spawn();

    let runtime = scenario_runtime(detections, detection_period);
    tokio::select! {
        _ = tokio::time::sleep(runtime) => info!("Scenario complete"),
        _ = tokio::signal::ctrl_c() => warn!("Interrupted"),
    }

    let summary = handle.snapshot();
    handle.stop();
    let mut monitor = handle.join().await?;

    info!(
        "Session summary: {} detections, alarm sessions {}, last alert {:?}",
        summary.frame_count,
        monitor.alarm().sessions_started(),
        summary.last_alert
    );

    if let Some(dispatcher) = monitor.take_dispatcher() {
        let dropped = dispatcher.dropped();
        dispatcher.close().await;
        if dropped > 0 {
            warn!("{} alerts were dropped", dropped);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_runtime_covers_every_detection() {
        let runtime = scenario_runtime(185, Duration::from_millis(116));
        assert_eq!(runtime, Duration::from_millis(185 * 116 + 500));
    }

    #[test]
    fn test_scenario_runtime_saturates() {
        assert_eq!(scenario_runtime(3, Duration::from_secs(u64::MAX / 2)), Duration::MAX);
        assert_eq!(scenario_runtime(1, Duration::MAX), Duration::MAX);
        assert_eq!(scenario_runtime(0, Duration::from_millis(116)), SCENARIO_SLACK);
    }
}
