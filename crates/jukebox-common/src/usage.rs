use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::JsonStore;
use crate::types::{hour_bucket, ListeningLimits, SessionRecord, Track, UsageStats};

pub const DAILY_LIMIT_REASON: &str = "Daily listening limit reached";
pub const SESSION_LIMIT_REASON: &str = "Session time limit reached";

/// Songs a session must exceed, without any skip, to earn the no-skip bonus
const NO_SKIP_MIN_SONGS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLimitCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl TimeLimitCheck {
    fn allowed() -> Self {
        Self { allowed: true, reason: None }
    }

    fn denied(reason: &str) -> Self {
        Self { allowed: false, reason: Some(reason.to_string()) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub duration_minutes: f64,
    pub songs_played: u32,
    pub skips: u32,
    pub earned_no_skip_bonus: bool,
}

/// Listening-time bookkeeping backed by `usage_stats.json`.
///
/// Every operation first rolls the day over when `last_reset` is from an earlier
/// date. Persistence failures are logged and the in-memory state carries on.
pub struct UsageTracker {
    stats: UsageStats,
    store: JsonStore<UsageStats>,
    rolled_over: bool,
}

impl UsageTracker {
    /// Load stats and apply the daily rollover for `now`
    pub fn load(store: JsonStore<UsageStats>, now: DateTime<Local>) -> Self {
        let stats = store.load_or_recover();
        let mut tracker = Self { stats, store, rolled_over: false };
        tracker.roll_over_if_needed(now);
        tracker
    }

    pub fn stats(&self) -> &UsageStats {
        &self.stats
    }

    /// Returns true once per rollover that happened since the last call
    pub fn take_rollover(&mut self) -> bool {
        std::mem::take(&mut self.rolled_over)
    }

    pub fn roll_over_if_needed(&mut self, now: DateTime<Local>) -> bool {
        if self.stats.last_reset.date_naive() >= now.date_naive() {
            return false;
        }

        info!(
            "New day: resetting usage counters (last reset {})",
            self.stats.last_reset.format("%Y-%m-%d")
        );

        let today = now.date_naive();
        self.stats.total_minutes_today = 0.0;
        self.stats.skip_count.clear();
        self.stats.sessions.retain(|s| s.is_open() || s.start.date_naive() == today);
        self.stats.last_reset = now;
        self.rolled_over = true;
        self.persist();
        true
    }

    /// Open a new session. An already open session is closed first and its
    /// summary returned.
    pub fn start_session(&mut self, now: DateTime<Local>) -> Option<SessionSummary> {
        self.roll_over_if_needed(now);

        let previous = if self.stats.open_session().is_some() {
            debug!("Session already open, closing it before starting a new one");
            self.close_open_session(now)
        } else {
            None
        };

        let session = SessionRecord::open(now);
        info!("Listening session started: {}", session.id);
        self.stats.sessions.push(session);
        self.persist();

        previous
    }

    pub fn end_session(&mut self, now: DateTime<Local>) -> Option<SessionSummary> {
        self.roll_over_if_needed(now);

        let summary = self.close_open_session(now);
        if summary.is_some() {
            self.persist();
        }
        summary
    }

    fn close_open_session(&mut self, now: DateTime<Local>) -> Option<SessionSummary> {
        let session = self.stats.open_session_mut()?;

        let duration_minutes = (now - session.start).num_seconds().max(0) as f64 / 60.0;
        session.end = Some(now);
        session.duration_minutes = Some(duration_minutes);

        let summary = SessionSummary {
            session_id: session.id,
            duration_minutes,
            songs_played: session.songs_played,
            skips: session.skips,
            earned_no_skip_bonus: session.skips == 0 && session.songs_played > NO_SKIP_MIN_SONGS,
        };

        self.stats.total_minutes_today += duration_minutes;

        info!(
            "Listening session ended: {} ({:.1} min, {} songs, {} skips)",
            summary.session_id, duration_minutes, summary.songs_played, summary.skips
        );
        Some(summary)
    }

    /// Tally a play. Returns the open session's start for reward accrual.
    pub fn record_song_play(
        &mut self,
        track: &Track,
        now: DateTime<Local>,
    ) -> Option<DateTime<Local>> {
        self.roll_over_if_needed(now);

        *self.stats.favorite_songs.entry(track.favorite_key()).or_insert(0) += 1;

        let session_start = self.stats.open_session_mut().map(|session| {
            session.songs_played += 1;
            session.start
        });

        debug!("Recorded play of '{}'", track.favorite_key());
        self.persist();
        session_start
    }

    pub fn record_skip(&mut self, now: DateTime<Local>) {
        self.roll_over_if_needed(now);

        *self.stats.skip_count.entry(hour_bucket(now.hour())).or_insert(0) += 1;
        if let Some(session) = self.stats.open_session_mut() {
            session.skips += 1;
        }

        self.persist();
    }

    pub fn skips_this_hour(&self, now: DateTime<Local>) -> u32 {
        if self.is_stale(now) {
            return 0;
        }
        self.stats.skip_count.get(&hour_bucket(now.hour())).copied().unwrap_or(0)
    }

    /// `extra_minutes` raises the daily limit (redeemed rewards)
    pub fn check_time_limits(
        &mut self,
        limits: &ListeningLimits,
        extra_minutes: u32,
        now: DateTime<Local>,
    ) -> TimeLimitCheck {
        self.roll_over_if_needed(now);

        if !limits.enabled {
            return TimeLimitCheck::allowed();
        }

        let daily_limit = (limits.daily_limit_minutes + extra_minutes) as f64;
        if self.minutes_used_today(now) >= daily_limit {
            return TimeLimitCheck::denied(DAILY_LIMIT_REASON);
        }

        if let Some(minutes) = self.current_session_minutes(now) {
            if minutes >= limits.session_limit_minutes as f64 {
                return TimeLimitCheck::denied(SESSION_LIMIT_REASON);
            }
        }

        TimeLimitCheck::allowed()
    }

    /// True while the current hour's skips are below the cap
    pub fn check_skip_limit(
        &mut self,
        limits: &ListeningLimits,
        extra_skips: u32,
        now: DateTime<Local>,
    ) -> bool {
        self.roll_over_if_needed(now);

        if !limits.enabled {
            return true;
        }
        self.skips_this_hour(now) < limits.skip_limit_per_hour + extra_skips
    }

    pub fn current_session_minutes(&self, now: DateTime<Local>) -> Option<f64> {
        self.stats
            .open_session()
            .map(|s| (now - s.start).num_seconds().max(0) as f64 / 60.0)
    }

    /// Closed sessions plus the open one
    pub fn minutes_used_today(&self, now: DateTime<Local>) -> f64 {
        let closed = if self.is_stale(now) { 0.0 } else { self.stats.total_minutes_today };
        closed + self.current_session_minutes(now).unwrap_or(0.0)
    }

    pub fn remaining_minutes(
        &self,
        limits: &ListeningLimits,
        extra_minutes: u32,
        now: DateTime<Local>,
    ) -> Option<f64> {
        if !limits.enabled {
            return None;
        }
        let limit = (limits.daily_limit_minutes + extra_minutes) as f64;
        Some((limit - self.minutes_used_today(now)).max(0.0))
    }

    /// Parent action: forget today's listening time and skips
    pub fn reset_today(&mut self, now: DateTime<Local>) {
        let today = now.date_naive();
        self.stats.total_minutes_today = 0.0;
        self.stats.skip_count.clear();
        self.stats.sessions.retain(|s| s.is_open() || s.start.date_naive() != today);
        if let Some(session) = self.stats.open_session_mut() {
            session.start = now;
            session.songs_played = 0;
            session.skips = 0;
        }
        self.stats.last_reset = now;
        self.persist();
        info!("Usage for today reset by parent");
    }

    pub fn top_favorites(&self, limit: usize) -> Vec<(String, u32)> {
        let mut favorites: Vec<(String, u32)> =
            self.stats.favorite_songs.iter().map(|(k, v)| (k.clone(), *v)).collect();
        favorites.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        favorites.truncate(limit);
        favorites
    }

    fn is_stale(&self, now: DateTime<Local>) -> bool {
        self.stats.last_reset.date_naive() < now.date_naive()
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.stats) {
            warn!("Failed to persist usage stats to {:?}: {}", self.store.path(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone};
    use tempfile::{tempdir, TempDir};

    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        let naive =
            NaiveDate::from_ymd_opt(2026, 3, day).unwrap().and_hms_opt(hour, minute, 0).unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    fn tracker_at(now: DateTime<Local>) -> (UsageTracker, TempDir) {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("usage_stats.json"));
        store.save(&UsageStats { last_reset: now, ..Default::default() }).unwrap();
        (UsageTracker::load(store, now), dir)
    }

    fn track(name: &str, artist: &str) -> Track {
        Track {
            id: name.to_lowercase(),
            name: name.to_string(),
            artists: vec![artist.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_session_minutes_accumulate_across_sessions() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));

        tracker.start_session(at(2, 9, 0));
        tracker.record_song_play(&track("Song A", "Band"), at(2, 9, 3));
        tracker.record_skip(at(2, 9, 4));
        tracker.record_song_play(&track("Song B", "Band"), at(2, 9, 10));
        let first = tracker.end_session(at(2, 9, 37)).unwrap();
        assert!((first.duration_minutes - 37.0).abs() < 1e-9);
        assert!((tracker.stats().total_minutes_today - 37.0).abs() < 1e-9);

        tracker.start_session(at(2, 16, 0));
        tracker.end_session(at(2, 16, 10));
        assert!((tracker.stats().total_minutes_today - 47.0).abs() < 1e-9);
    }

    #[test]
    fn test_end_without_open_session_is_noop() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));
        assert!(tracker.end_session(at(2, 9, 30)).is_none());
        assert_eq!(tracker.stats().total_minutes_today, 0.0);
    }

    #[test]
    fn test_starting_twice_closes_previous_session() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));

        assert!(tracker.start_session(at(2, 9, 0)).is_none());
        let closed = tracker.start_session(at(2, 9, 20)).unwrap();
        assert!((closed.duration_minutes - 20.0).abs() < 1e-9);
        assert_eq!(tracker.stats().sessions.len(), 2);
        assert!(tracker.stats().open_session().is_some());
    }

    #[test]
    fn test_no_skip_bonus_requires_more_than_five_songs() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));

        tracker.start_session(at(2, 9, 0));
        for i in 0..5 {
            tracker.record_song_play(&track(&format!("Song {}", i), "Band"), at(2, 9, i + 1));
        }
        assert!(!tracker.end_session(at(2, 9, 30)).unwrap().earned_no_skip_bonus);

        tracker.start_session(at(2, 10, 0));
        for i in 0..6 {
            tracker.record_song_play(&track(&format!("Song {}", i), "Band"), at(2, 10, i + 1));
        }
        assert!(tracker.end_session(at(2, 10, 30)).unwrap().earned_no_skip_bonus);

        tracker.start_session(at(2, 11, 0));
        for i in 0..6 {
            tracker.record_song_play(&track(&format!("Song {}", i), "Band"), at(2, 11, i + 1));
        }
        tracker.record_skip(at(2, 11, 10));
        assert!(!tracker.end_session(at(2, 11, 30)).unwrap().earned_no_skip_bonus);
    }

    #[test]
    fn test_favorites_keyed_by_title_and_primary_artist() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));

        tracker.record_song_play(&track("Let It Go", "Idina Menzel"), at(2, 9, 0));
        tracker.record_song_play(&track("Let It Go", "Idina Menzel"), at(2, 9, 5));
        tracker.record_song_play(&track("Happy", "Pharrell Williams"), at(2, 9, 9));

        assert_eq!(tracker.stats().favorite_songs["Let It Go - Idina Menzel"], 2);
        assert_eq!(tracker.top_favorites(1), vec![("Let It Go - Idina Menzel".to_string(), 2)]);
    }

    #[test]
    fn test_day_boundary_resets_counters_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("usage_stats.json");
        JsonStore::new(&path)
            .save(&UsageStats { last_reset: at(2, 9, 0), ..Default::default() })
            .unwrap();
        {
            let mut tracker = UsageTracker::load(JsonStore::new(&path), at(2, 9, 0));
            tracker.start_session(at(2, 9, 0));
            tracker.record_skip(at(2, 9, 5));
            tracker.end_session(at(2, 10, 0));
            assert!((tracker.stats().total_minutes_today - 60.0).abs() < 1e-9);
        }

        let mut tracker = UsageTracker::load(JsonStore::new(&path), at(3, 8, 0));
        assert!(tracker.take_rollover());
        assert_eq!(tracker.stats().total_minutes_today, 0.0);
        assert!(tracker.stats().skip_count.is_empty());
        assert!(tracker.stats().sessions.is_empty());
        assert!(!tracker.take_rollover());
    }

    #[test]
    fn test_daily_limit_denies_at_or_over_limit() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));
        let limits = ListeningLimits { daily_limit_minutes: 120, ..Default::default() };

        tracker.stats.total_minutes_today = 119.5;
        assert!(tracker.check_time_limits(&limits, 0, at(2, 12, 0)).allowed);

        tracker.stats.total_minutes_today = 120.0;
        let check = tracker.check_time_limits(&limits, 0, at(2, 12, 0));
        assert!(!check.allowed);

        tracker.stats.total_minutes_today = 125.0;
        let check = tracker.check_time_limits(&limits, 0, at(2, 12, 0));
        assert_eq!(
            check,
            TimeLimitCheck { allowed: false, reason: Some(DAILY_LIMIT_REASON.to_string()) }
        );
    }

    #[test]
    fn test_open_session_counts_toward_daily_limit() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));
        let limits = ListeningLimits {
            daily_limit_minutes: 30,
            session_limit_minutes: 90,
            ..Default::default()
        };

        tracker.start_session(at(2, 9, 0));
        tracker.end_session(at(2, 9, 10));
        tracker.start_session(at(2, 10, 0));

        assert!(tracker.check_time_limits(&limits, 0, at(2, 10, 19)).allowed);
        let check = tracker.check_time_limits(&limits, 0, at(2, 10, 20));
        assert_eq!(check.reason.as_deref(), Some(DAILY_LIMIT_REASON));
        assert!(!tracker.check_time_limits(&limits, 0, at(2, 11, 15)).allowed);
    }

    #[test]
    fn test_extra_minutes_raise_daily_limit() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));
        let limits = ListeningLimits { daily_limit_minutes: 120, ..Default::default() };
        tracker.stats.total_minutes_today = 125.0;

        assert!(tracker.check_time_limits(&limits, 15, at(2, 12, 0)).allowed);
    }

    #[test]
    fn test_session_limit() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));
        let limits = ListeningLimits { session_limit_minutes: 45, ..Default::default() };

        tracker.start_session(at(2, 9, 0));
        assert!(tracker.check_time_limits(&limits, 0, at(2, 9, 44)).allowed);

        let check = tracker.check_time_limits(&limits, 0, at(2, 9, 45));
        assert_eq!(check.reason.as_deref(), Some(SESSION_LIMIT_REASON));
    }

    #[test]
    fn test_disabled_limits_always_allow() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));
        let limits = ListeningLimits { enabled: false, ..Default::default() };
        tracker.stats.total_minutes_today = 1_000.0;

        assert!(tracker.check_time_limits(&limits, 0, at(2, 12, 0)).allowed);
        assert!(tracker.remaining_minutes(&limits, 0, at(2, 12, 0)).is_none());
    }

    #[test]
    fn test_skip_limit_per_hour_bucket() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));
        let limits = ListeningLimits { skip_limit_per_hour: 3, ..Default::default() };

        for minute in 0..3 {
            assert!(tracker.check_skip_limit(&limits, 0, at(2, 9, minute)));
            tracker.record_skip(at(2, 9, minute));
        }
        assert!(!tracker.check_skip_limit(&limits, 0, at(2, 9, 30)));
        assert!(tracker.check_skip_limit(&limits, 2, at(2, 9, 30)));
        assert!(tracker.check_skip_limit(&limits, 0, at(2, 10, 0)));
        assert_eq!(tracker.stats().skip_count["hour_9"], 3);
    }

    #[test]
    fn test_remaining_minutes_includes_open_session() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));
        let limits = ListeningLimits { daily_limit_minutes: 60, ..Default::default() };

        tracker.start_session(at(2, 9, 0));
        tracker.end_session(at(2, 9, 20));
        tracker.start_session(at(2, 10, 0));

        let remaining = tracker.remaining_minutes(&limits, 0, at(2, 10, 10)).unwrap();
        assert!((remaining - 30.0).abs() < 1e-9);
        assert_eq!(tracker.remaining_minutes(&limits, 0, at(2, 11, 30)), Some(0.0));
    }

    #[test]
    fn test_reset_today() {
        let (mut tracker, _dir) = tracker_at(at(2, 9, 0));
        tracker.start_session(at(2, 9, 0));
        tracker.record_skip(at(2, 9, 1));
        tracker.end_session(at(2, 9, 50));

        tracker.reset_today(at(2, 10, 0));
        assert_eq!(tracker.stats().total_minutes_today, 0.0);
        assert!(tracker.stats().skip_count.is_empty());
        assert_eq!(tracker.minutes_used_today(at(2, 10, 0)), 0.0);
    }

    #[test]
    fn test_stats_persist_after_each_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("usage_stats.json");
        let now = Local::now();

        let mut tracker = UsageTracker::load(JsonStore::new(&path), now);
        tracker.record_song_play(&track("Song", "Band"), now);
        tracker.record_skip(now + Duration::seconds(1));

        let reloaded: UsageStats = JsonStore::new(&path).load_or_default().unwrap();
        assert_eq!(reloaded.favorite_songs["Song - Band"], 1);
        assert_eq!(reloaded.skip_count.values().sum::<u32>(), 1);
    }
}
