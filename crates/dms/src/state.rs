//! Driver alertness classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse alertness state, recomputed from scratch every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverState {
    /// Eyes open, head steady
    #[default]
    Active,
    /// Eyes open but the head is moving around (fidgety or distracted)
    Tension,
    /// Eyes nearly shut
    Sleeping,
}

impl DriverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverState::Active => "active",
            DriverState::Tension => "tension",
            DriverState::Sleeping => "sleeping",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds the classifier works from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateThresholds {
    /// EAR below this counts as eyes closed
    pub ear_closed: f32,
    /// EAR below this counts as asleep
    pub ear_sleeping: f32,
    /// Mean keypoint displacement (pixels per detection) that reads as tension
    pub tension_movement: f32,
}

impl Default for StateThresholds {
    fn default() -> Self {
        Self {
            ear_closed: 0.21,
            ear_sleeping: 0.12,
            tension_movement: 3.0,
        }
    }
}

/// Classify one frame from its averaged EAR and movement
pub fn classify(ear: f32, movement: f32, thresholds: &StateThresholds) -> DriverState {
    if ear < thresholds.ear_sleeping {
        DriverState::Sleeping
    } else if ear >= thresholds.ear_closed && movement >= thresholds.tension_movement {
        DriverState::Tension
    } else {
        DriverState::Active
    }
}
