use chrono::{DateTime, Utc};
use jukebox_common::PlaybackSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages pushed to `/ws` subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PlaybackChanged {
        snapshot: PlaybackSnapshot,
    },
    SessionStarted {
        timestamp: DateTime<Utc>,
    },
    SessionEnded {
        session_id: Uuid,
        duration_minutes: f64,
        songs_played: u32,
        skips: u32,
        timestamp: DateTime<Utc>,
    },
    /// Shortly before the schedule window closes or the daily allowance runs out
    TimeLimitWarning {
        message: String,
        timestamp: DateTime<Utc>,
    },
    ListeningBlocked {
        reason: String,
        next_window: Option<String>,
        timestamp: DateTime<Utc>,
    },
    TrackBlocked {
        track_name: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    RewardRedeemed {
        name: String,
        points_remaining: f64,
        timestamp: DateTime<Utc>,
    },
    ConfigUpdated {
        section: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn listening_blocked(reason: impl Into<String>, next_window: Option<String>) -> Self {
        Event::ListeningBlocked { reason: reason.into(), next_window, timestamp: Utc::now() }
    }

    pub fn config_updated(section: &str) -> Self {
        Event::ConfigUpdated { section: section.to_string(), timestamp: Utc::now() }
    }

    /// True for events the child-facing player must react to immediately
    pub fn is_enforcement(&self) -> bool {
        matches!(
            self,
            Event::ListeningBlocked { .. }
                | Event::TrackBlocked { .. }
                | Event::TimeLimitWarning { .. }
        )
    }
}
