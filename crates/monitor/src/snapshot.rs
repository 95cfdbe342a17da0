//! Observable monitor state

use alerting::AlertKind;
use dms::{DriverState, EpisodePhase};
use serde::Serialize;
use std::time::Duration;

/// What the UI sees after each completed iteration.
///
/// Published whole through a `watch` channel, so readers never observe
/// a half-updated frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    /// Completed detections this session
    pub frame_count: u64,
    pub face_detected: bool,
    pub left_ear: f32,
    pub right_ear: f32,
    pub ear: f32,
    pub movement: f32,
    pub driver_state: DriverState,
    pub eyes_closed: bool,
    pub eyes_closed_duration: Duration,
    pub phase: EpisodePhase,
    pub alarm_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_alert: Option<AlertKind>,
}
