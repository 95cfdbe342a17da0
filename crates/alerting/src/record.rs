//! Alert record sent to the alert sink

use chrono::{DateTime, Utc};
use dms::{AlarmCause, DriverState, EpisodeEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Alert types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Eyes closed past the warning duration
    Warning,
    /// Eyes closed past the alarm duration
    Alarm,
    /// Alarm raised by a sleeping classification
    Sleeping,
    /// Open eyes with a restless head; repeats every frame it holds
    Tension,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Warning => "warning",
            AlertKind::Alarm => "alarm",
            AlertKind::Sleeping => "sleeping",
            AlertKind::Tension => "tension",
        }
    }

    /// Whether this alert should sound the alarm
    pub fn is_alarm(&self) -> bool {
        matches!(self, AlertKind::Alarm | AlertKind::Sleeping)
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert, as delivered to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub driver_id: String,
    pub alert_type: AlertKind,
    pub timestamp: DateTime<Utc>,
    pub driver_state: DriverState,
    /// Eyes-closed duration when the alert was raised (milliseconds)
    #[serde(rename = "eyeClosedDuration")]
    pub eye_closed_duration_ms: u64,
    /// Episode the alert belongs to; `0` for alerts outside an episode
    #[serde(default)]
    pub episode: u64,
}

impl AlertRecord {
    pub fn new(
        driver_id: impl Into<String>,
        alert_type: AlertKind,
        driver_state: DriverState,
        eye_closed: Duration,
        episode: u64,
    ) -> Self {
        Self {
            driver_id: driver_id.into(),
            alert_type,
            timestamp: Utc::now(),
            driver_state,
            eye_closed_duration_ms: eye_closed.as_millis() as u64,
            episode,
        }
    }

    /// Record for an episode threshold crossing
    pub fn from_episode(driver_id: &str, event: &EpisodeEvent, driver_state: DriverState) -> Self {
        match *event {
            EpisodeEvent::Warning { episode, closed_for } => {
                Self::new(driver_id, AlertKind::Warning, driver_state, closed_for, episode)
            }
            EpisodeEvent::Alarm {
                episode,
                closed_for,
                cause,
            } => {
                let kind = match cause {
                    AlarmCause::Duration => AlertKind::Alarm,
                    AlarmCause::Sleeping => AlertKind::Sleeping,
                };
                Self::new(driver_id, kind, driver_state, closed_for, episode)
            }
        }
    }

    /// Seconds the eyes had been closed
    pub fn eye_closed_secs(&self) -> f64 {
        self.eye_closed_duration_ms as f64 / 1000.0
    }
}
