//! Layered settings: defaults, optional file, `DROWSY__*` environment

use crate::controller::SessionOptions;
use crate::MonitorError;
use alarm::AlarmConfig;
use alerting::DispatcherConfig;
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment prefix; nested keys use `__`, e.g. `DROWSY__MONITOR__EAR_CLOSED_THRESHOLD`
const ENV_PREFIX: &str = "DROWSY";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Per-session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Driver the alerts are attributed to
    pub driver_id: String,
    /// Scheduling period of the loop (milliseconds); detections are
    /// further throttled by `monitor.detection_interval_ms`
    pub frame_period_ms: u64,
    /// Silence the alarm as soon as the eyes reopen
    pub stop_alarm_on_eyes_open: bool,
    pub camera_width: u32,
    pub camera_height: u32,
    /// JSON face script for the synthetic detector
    pub scenario_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            driver_id: "driver-unknown".to_string(),
            frame_period_ms: 16,
            stop_alarm_on_eyes_open: false,
            camera_width: 640,
            camera_height: 480,
            scenario_path: None,
        }
    }
}

impl SessionConfig {
    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            driver_id: self.driver_id.clone(),
            frame_period: Duration::from_millis(self.frame_period_ms),
            stop_alarm_on_eyes_open: self.stop_alarm_on_eyes_open,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub monitor: DmsConfig,
    pub alarm: AlarmConfig,
    pub alerts: DispatcherConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load defaults, then `path` (TOML, JSON or YAML by extension), then environment
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!("Loading settings from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        self.monitor
            .validate()
            .map_err(|e| MonitorError::Config(e.to_string()))?;
        if self.session.frame_period_ms == 0 {
            return Err(MonitorError::Config("session.frame_period_ms must be positive".into()));
        }
        if self.session.driver_id.trim().is_empty() {
            return Err(MonitorError::Config("session.driver_id must not be empty".into()));
        }
        if self.alarm.tone_hz <= 0.0 || self.alarm.max_duration_sec == 0 {
            return Err(MonitorError::Config(
                "alarm.tone_hz and alarm.max_duration_sec must be positive".into(),
            ));
        }
        Ok(())
    }
}
