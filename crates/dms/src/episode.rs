//! Eyes-closed episode tracking and warning/alarm escalation
//!
//! An episode runs from the first closed-eye frame until the eyes open
//! again. Within one episode the warning and the alarm each fire at
//! most once, independently of each other; reopening the eyes clears
//! both.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Where the current episode stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// Eyes open, no timers running
    #[default]
    Open,
    /// Closed, still under the warning threshold
    ClosedBelowWarning,
    /// Closed past the warning threshold; warning fired
    ClosedWarning,
    /// Alarm fired
    ClosedAlarm,
}

impl EpisodePhase {
    pub fn is_closed(&self) -> bool {
        !matches!(self, EpisodePhase::Open)
    }
}

/// What raised the alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmCause {
    /// Continuous closure reached the alarm duration
    Duration,
    /// The frame was classified as sleeping
    Sleeping,
}

/// A threshold crossing inside an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeEvent {
    Warning { episode: u64, closed_for: Duration },
    Alarm { episode: u64, closed_for: Duration, cause: AlarmCause },
}

/// Result of feeding one frame into the tracker
#[derive(Debug, Clone, Default)]
pub struct EpisodeUpdate {
    pub phase: EpisodePhase,
    pub closed_for: Duration,
    pub events: Vec<EpisodeEvent>,
}

/// Debounces eyes-closed frames into one-shot warning and alarm events
#[derive(Debug, Clone)]
pub struct EpisodeTracker {
    warning_after: Duration,
    alarm_after: Duration,
    closed_since: Option<Instant>,
    warning_fired: bool,
    alarm_fired: bool,
    episodes: u64,
}

impl EpisodeTracker {
    pub fn new(warning_after: Duration, alarm_after: Duration) -> Self {
        Self {
            warning_after,
            alarm_after,
            closed_since: None,
            warning_fired: false,
            alarm_fired: false,
            episodes: 0,
        }
    }

    /// Feed one analysed frame.
    ///
    /// `sleeping` is the classifier's verdict for the same frame and can
    /// raise the alarm before the duration threshold; both paths share
    /// one alarm flag.
    pub fn update(&mut self, eyes_closed: bool, sleeping: bool, now: Instant) -> EpisodeUpdate {
        if !eyes_closed {
            if self.closed_since.is_some() {
                debug!("Episode {} ended", self.episodes);
            }
            self.clear_episode();
            return EpisodeUpdate::default();
        }

        let since = match self.closed_since {
            Some(since) => since,
            None => {
                self.episodes += 1;
                debug!("Episode {} started", self.episodes);
                self.closed_since = Some(now);
                now
            }
        };
        let closed_for = now.saturating_duration_since(since);
        let mut events = Vec::new();

        if !self.warning_fired && closed_for >= self.warning_after {
            self.warning_fired = true;
            events.push(EpisodeEvent::Warning {
                episode: self.episodes,
                closed_for,
            });
        }

        if !self.alarm_fired {
            let cause = if closed_for >= self.alarm_after {
                Some(AlarmCause::Duration)
            } else if sleeping {
                Some(AlarmCause::Sleeping)
            } else {
                None
            };
            if let Some(cause) = cause {
                self.alarm_fired = true;
                events.push(EpisodeEvent::Alarm {
                    episode: self.episodes,
                    closed_for,
                    cause,
                });
            }
        }

        EpisodeUpdate {
            phase: self.phase(),
            closed_for,
            events,
        }
    }

    pub fn phase(&self) -> EpisodePhase {
        match (self.closed_since, self.warning_fired, self.alarm_fired) {
            (None, _, _) => EpisodePhase::Open,
            (Some(_), _, true) => EpisodePhase::ClosedAlarm,
            (Some(_), true, false) => EpisodePhase::ClosedWarning,
            (Some(_), false, false) => EpisodePhase::ClosedBelowWarning,
        }
    }

    /// How long the current episode has run at `now`
    pub fn closed_for(&self, now: Instant) -> Duration {
        self.closed_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    /// Number of episodes seen so far
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Back to `Open`, dropping timers and one-shot flags
    pub fn reset(&mut self) {
        self.clear_episode();
    }

    fn clear_episode(&mut self) {
        self.closed_since = None;
        self.warning_fired = false;
        self.alarm_fired = false;
    }
}
