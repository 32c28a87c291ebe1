use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Music
// ============================================================================

/// A track as seen by the kiosk, mapped from the Spotify playback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Track {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub explicit: bool,
    /// Only populated when the caller looked up artist genres
    #[serde(default)]
    pub genres: Vec<String>,
    pub duration_ms: u64,
}

impl Track {
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }

    /// Key used for the favorite-song tally: "<title> - <primary artist>"
    pub fn favorite_key(&self) -> String {
        match self.primary_artist() {
            Some(artist) => format!("{} - {}", self.name, artist),
            None => self.name.clone(),
        }
    }
}

/// Shared "current playback" snapshot refreshed by the poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub track: Option<Track>,
    pub progress_ms: u64,
    pub volume_percent: Option<u8>,
    pub device_name: Option<String>,
    pub fetched_at: DateTime<Local>,
}

impl PlaybackSnapshot {
    pub fn idle(fetched_at: DateTime<Local>) -> Self {
        Self {
            is_playing: false,
            track: None,
            progress_ms: 0,
            volume_percent: None,
            device_name: None,
            fetched_at,
        }
    }

    pub fn track_id(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.id.as_str())
    }
}

// ============================================================================
// Usage
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub start: DateTime<Local>,
    pub end: Option<DateTime<Local>>,
    pub duration_minutes: Option<f64>,
    pub songs_played: u32,
    pub skips: u32,
}

impl SessionRecord {
    pub fn open(start: DateTime<Local>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start,
            end: None,
            duration_minutes: None,
            songs_played: 0,
            skips: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Persisted listening statistics (`usage_stats.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub sessions: Vec<SessionRecord>,
    pub total_minutes_today: f64,
    pub last_reset: DateTime<Local>,
    pub favorite_songs: HashMap<String, u32>,
    /// Keyed `hour_<N>` for the current day
    pub skip_count: HashMap<String, u32>,
}

impl Default for UsageStats {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            total_minutes_today: 0.0,
            last_reset: Local::now(),
            favorite_songs: HashMap::new(),
            skip_count: HashMap::new(),
        }
    }
}

impl UsageStats {
    pub fn open_session(&self) -> Option<&SessionRecord> {
        self.sessions.last().filter(|s| s.is_open())
    }

    pub fn open_session_mut(&mut self) -> Option<&mut SessionRecord> {
        self.sessions.last_mut().filter(|s| s.is_open())
    }
}

pub fn hour_bucket(hour: u32) -> String {
    format!("hour_{}", hour)
}

// ============================================================================
// Schedule
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

impl TimeWindow {
    pub fn new(start: &str, end: &str) -> Self {
        Self { start: start.to_string(), end: end.to_string() }
    }
}

/// Named listening periods for one kind of day, e.g. "morning" → 07:00-08:30
pub type DaySchedule = BTreeMap<String, TimeWindow>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub weekday: DaySchedule,
    pub weekend: DaySchedule,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let weekday = BTreeMap::from([
            ("morning".to_string(), TimeWindow::new("07:00", "08:00")),
            ("afternoon".to_string(), TimeWindow::new("15:00", "18:00")),
            ("evening".to_string(), TimeWindow::new("18:30", "20:00")),
        ]);
        let weekend = BTreeMap::from([
            ("morning".to_string(), TimeWindow::new("08:00", "12:00")),
            ("afternoon".to_string(), TimeWindow::new("13:00", "18:00")),
            ("evening".to_string(), TimeWindow::new("18:30", "21:00")),
        ]);

        Self { enabled: false, weekday, weekend }
    }
}

// ============================================================================
// Rewards
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    /// Raises today's daily limit by `value` minutes
    ExtraTime,
    /// Raises the hourly skip cap by `value`
    ExtraSkips,
    /// Handled by the parent, e.g. "pick the car music"
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub name: String,
    pub cost: u32,
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub name: String,
    pub cost: u32,
    #[serde(rename = "type")]
    pub reward_type: RewardType,
    pub value: u32,
    pub redeemed_at: DateTime<Local>,
}

/// Persisted reward points (`rewards.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardsState {
    pub enabled: bool,
    pub points: f64,
    pub rewards_available: Vec<Reward>,
    pub redeemed_today: Vec<Redemption>,
    #[serde(default = "default_points_per_minute")]
    pub points_per_minute: f64,
    #[serde(default = "default_daily_login_bonus")]
    pub daily_login_bonus: f64,
    #[serde(default = "default_no_skip_bonus")]
    pub no_skip_bonus: f64,
    #[serde(default)]
    pub last_accrual: Option<DateTime<Local>>,
}

fn default_points_per_minute() -> f64 {
    0.1
}

fn default_daily_login_bonus() -> f64 {
    5.0
}

fn default_no_skip_bonus() -> f64 {
    10.0
}

impl Default for RewardsState {
    fn default() -> Self {
        Self {
            enabled: false,
            points: 0.0,
            rewards_available: vec![
                Reward {
                    name: "15 extra minutes".to_string(),
                    cost: 50,
                    reward_type: RewardType::ExtraTime,
                    value: 15,
                },
                Reward {
                    name: "5 extra skips".to_string(),
                    cost: 20,
                    reward_type: RewardType::ExtraSkips,
                    value: 5,
                },
                Reward {
                    name: "Choose the car music".to_string(),
                    cost: 100,
                    reward_type: RewardType::Custom,
                    value: 0,
                },
            ],
            redeemed_today: Vec::new(),
            points_per_minute: default_points_per_minute(),
            daily_login_bonus: default_daily_login_bonus(),
            no_skip_bonus: default_no_skip_bonus(),
            last_accrual: None,
        }
    }
}

// ============================================================================
// Parental configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFilterConfig {
    pub explicit_blocked: bool,
    pub blocked_artists: Vec<String>,
    pub blocked_songs: Vec<String>,
    pub blocked_albums: Vec<String>,
    pub allowed_genres: Vec<String>,
    pub blocked_genres: Vec<String>,
}

impl Default for ContentFilterConfig {
    fn default() -> Self {
        Self {
            explicit_blocked: true,
            blocked_artists: Vec::new(),
            blocked_songs: Vec::new(),
            blocked_albums: Vec::new(),
            allowed_genres: Vec::new(),
            blocked_genres: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningLimits {
    pub enabled: bool,
    pub daily_limit_minutes: u32,
    pub session_limit_minutes: u32,
    pub skip_limit_per_hour: u32,
    pub max_volume: u8,
}

impl Default for ListeningLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_limit_minutes: 120,
            session_limit_minutes: 60,
            skip_limit_per_hour: 10,
            max_volume: 80,
        }
    }
}

/// Persisted parental settings (`parental_config.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParentalConfig {
    pub content_filter: ContentFilterConfig,
    pub limits: ListeningLimits,
}

// ============================================================================
// Bluetooth
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub paired: bool,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub trusted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_favorite_key_uses_primary_artist() {
        let track = Track {
            name: "Yellow Submarine".to_string(),
            artists: vec!["The Beatles".to_string(), "Someone Else".to_string()],
            ..Default::default()
        };
        assert_eq!(track.favorite_key(), "Yellow Submarine - The Beatles");

        let untitled = Track { name: "Loop".to_string(), ..Default::default() };
        assert_eq!(untitled.favorite_key(), "Loop");
    }

    #[test]
    fn test_default_schedule_has_three_periods() {
        let schedule = ScheduleConfig::default();
        assert!(!schedule.enabled);
        for day in [&schedule.weekday, &schedule.weekend] {
            assert_eq!(day.len(), 3);
            assert!(day.contains_key("morning"));
            assert!(day.contains_key("afternoon"));
            assert!(day.contains_key("evening"));
        }
    }

    #[test]
    fn test_reward_type_serialization() {
        let reward = Reward {
            name: "Bonus".to_string(),
            cost: 10,
            reward_type: RewardType::ExtraTime,
            value: 15,
        };
        let json = serde_json::to_value(&reward).unwrap();
        assert_eq!(json["type"], "extra_time");
    }

    #[test]
    fn test_rewards_state_fills_missing_rates() {
        let json = r#"{"enabled":true,"points":12.0,"rewards_available":[],"redeemed_today":[]}"#;
        let state: RewardsState = serde_json::from_str(json).unwrap();
        assert_eq!(state.points_per_minute, 0.1);
        assert_eq!(state.daily_login_bonus, 5.0);
        assert!(state.last_accrual.is_none());
    }

    #[test]
    fn test_open_session_only_returns_unclosed_tail() {
        let mut stats = UsageStats::default();
        assert!(stats.open_session().is_none());

        let mut closed = SessionRecord::open(Local::now());
        closed.end = Some(Local::now());
        stats.sessions.push(closed);
        assert!(stats.open_session().is_none());

        stats.sessions.push(SessionRecord::open(Local::now()));
        assert!(stats.open_session().is_some());
    }
}
