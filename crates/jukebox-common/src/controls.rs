// Parental controls coordinator
//
// Owns the parental settings, the listening schedule, usage bookkeeping and the
// rewards ledger. The daemon keeps one instance behind a mutex and routes every
// playback event and admin change through it.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DataPaths;
use crate::content_filter::{ContentFilter, FilterDecision};
use crate::error::{Error, Result};
use crate::rewards::{RewardsLedger, RewardsSettings};
use crate::schedule::{validate_schedule, AccessResult, ScheduleGate};
use crate::store::JsonStore;
use crate::types::{
    ParentalConfig, Redemption, RewardsState, ScheduleConfig, SessionRecord, Track, UsageStats,
};
use crate::usage::{SessionSummary, UsageTracker};

/// Whether music may play right now, and why not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    /// Start of the next schedule window today when blocked by the schedule
    pub next_window: Option<String>,
}

impl ListeningDecision {
    fn allowed() -> Self {
        Self { allowed: true, reason: None, next_window: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteSong {
    pub title: String,
    pub plays: u32,
}

/// Dashboard view of today's listening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub date: NaiveDate,
    pub minutes_used_today: f64,
    pub remaining_minutes: Option<f64>,
    pub daily_limit_minutes: u32,
    pub extra_minutes_today: u32,
    pub current_session_minutes: Option<f64>,
    pub skips_this_hour: u32,
    pub skip_limit_this_hour: u32,
    pub within_schedule: bool,
    pub points: f64,
    pub sessions_today: Vec<SessionRecord>,
    pub top_favorites: Vec<FavoriteSong>,
}

const TOP_FAVORITES: usize = 10;

pub struct ParentalControls {
    parental: ParentalConfig,
    parental_store: JsonStore<ParentalConfig>,
    schedule: ScheduleGate,
    schedule_store: JsonStore<ScheduleConfig>,
    filter: ContentFilter,
    usage: UsageTracker,
    rewards: RewardsLedger,
}

impl ParentalControls {
    /// Load every document under `paths`, creating defaults for missing ones,
    /// and apply the daily rollover for `now`.
    pub fn load(paths: &DataPaths, now: DateTime<Local>) -> Self {
        let parental_store = JsonStore::new(paths.parental_config());
        let parental: ParentalConfig = parental_store.load_or_recover();

        let schedule_store = JsonStore::new(paths.schedule());
        let schedule_config: ScheduleConfig = schedule_store.load_or_recover();
        let schedule_config = match validate_schedule(&schedule_config) {
            Ok(()) => schedule_config,
            Err(e) => {
                warn!("Stored schedule is invalid ({}), falling back to defaults", e);
                ScheduleConfig::default()
            }
        };

        let usage = UsageTracker::load(JsonStore::new(paths.usage_stats()), now);
        let rewards = RewardsLedger::load(JsonStore::new(paths.rewards()));

        info!("Parental controls loaded from {:?}", paths.root());

        let mut controls = Self {
            filter: ContentFilter::new(&parental.content_filter),
            parental,
            parental_store,
            schedule: ScheduleGate::new(schedule_config),
            schedule_store,
            usage,
            rewards,
        };
        controls.apply_rollover();
        controls
    }

    pub fn parental_config(&self) -> &ParentalConfig {
        &self.parental
    }

    pub fn schedule_config(&self) -> &ScheduleConfig {
        self.schedule.config()
    }

    pub fn usage_stats(&self) -> &UsageStats {
        self.usage.stats()
    }

    pub fn rewards_state(&self) -> &RewardsState {
        self.rewards.state()
    }

    pub fn has_open_session(&self) -> bool {
        self.usage.stats().open_session().is_some()
    }

    // ------------------------------------------------------------------------
    // Playback events
    // ------------------------------------------------------------------------

    pub fn start_session(&mut self, now: DateTime<Local>) -> Option<SessionSummary> {
        self.sync_day(now);
        self.accrue_open_session(now);
        let previous = self.usage.start_session(now);
        if let Some(summary) = &previous {
            self.settle_bonus(summary);
        }
        previous
    }

    pub fn end_session(&mut self, now: DateTime<Local>) -> Option<SessionSummary> {
        self.sync_day(now);
        self.accrue_open_session(now);
        let summary = self.usage.end_session(now)?;
        self.settle_bonus(&summary);
        Some(summary)
    }

    pub fn record_song_play(&mut self, track: &Track, now: DateTime<Local>) {
        self.sync_day(now);
        if let Some(session_start) = self.usage.record_song_play(track, now) {
            self.rewards.accrue_listening(now, session_start);
        }
    }

    pub fn record_skip(&mut self, now: DateTime<Local>) {
        self.sync_day(now);
        self.usage.record_skip(now);
    }

    // ------------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------------

    /// Schedule first, then the daily and session limits
    pub fn evaluate(&mut self, now: DateTime<Local>) -> ListeningDecision {
        self.sync_day(now);

        if let AccessResult::Denied { reason, next_window } = self.schedule.check_access(now) {
            return ListeningDecision { allowed: false, reason: Some(reason), next_window };
        }

        let extra = self.rewards.extra_minutes_today();
        let check = self.usage.check_time_limits(&self.parental.limits, extra, now);
        if !check.allowed {
            return ListeningDecision { allowed: false, reason: check.reason, next_window: None };
        }

        ListeningDecision::allowed()
    }

    pub fn can_skip(&mut self, now: DateTime<Local>) -> bool {
        self.sync_day(now);
        let extra = self.rewards.extra_skips_today();
        self.usage.check_skip_limit(&self.parental.limits, extra, now)
    }

    pub fn check_track(&self, track: &Track) -> FilterDecision {
        self.filter.check(track)
    }

    pub fn is_track_allowed(&self, track: &Track) -> bool {
        self.filter.is_allowed(track)
    }

    pub fn clamp_volume(&self, requested: u8) -> u8 {
        requested.min(self.parental.limits.max_volume).min(100)
    }

    /// Message for an upcoming cut-off: the schedule window closing or the daily
    /// allowance running out within `warning_minutes`.
    pub fn upcoming_limit_warning(
        &mut self,
        now: DateTime<Local>,
        warning_minutes: u32,
    ) -> Option<String> {
        self.sync_day(now);

        if let Some(minutes) = self.schedule.minutes_until_close(now) {
            if minutes <= warning_minutes as i64 {
                return Some(format!("Listening time ends in {} minutes", minutes.max(0)));
            }
        }

        let extra = self.rewards.extra_minutes_today();
        let remaining = self.usage.remaining_minutes(&self.parental.limits, extra, now)?;
        if remaining > 0.0 && remaining <= warning_minutes as f64 {
            return Some(format!("{} minutes of music left today", remaining.ceil() as u32));
        }
        None
    }

    // ------------------------------------------------------------------------
    // Admin changes
    // ------------------------------------------------------------------------

    pub fn update_parental_config(&mut self, config: ParentalConfig) -> Result<()> {
        if config.limits.max_volume > 100 {
            return Err(Error::InvalidConfig("max_volume must be between 0 and 100".to_string()));
        }
        if config.limits.enabled && config.limits.session_limit_minutes == 0 {
            return Err(Error::InvalidConfig(
                "session_limit_minutes must be greater than 0".to_string(),
            ));
        }

        self.parental_store.save(&config)?;
        self.filter = ContentFilter::new(&config.content_filter);
        self.parental = config;
        info!("Parental configuration updated");
        Ok(())
    }

    pub fn update_schedule(&mut self, config: ScheduleConfig) -> Result<()> {
        validate_schedule(&config)?;
        self.schedule_store.save(&config)?;
        info!("Listening schedule updated (enabled: {})", config.enabled);
        self.schedule = ScheduleGate::new(config);
        Ok(())
    }

    pub fn redeem_reward(&mut self, name: &str, now: DateTime<Local>) -> Result<Redemption> {
        self.sync_day(now);
        self.rewards.redeem(name, now)
    }

    pub fn adjust_points(&mut self, delta: f64) -> f64 {
        self.rewards.adjust_points(delta)
    }

    pub fn reset_rewards(&mut self) {
        self.rewards.reset();
    }

    pub fn update_rewards_settings(&mut self, settings: RewardsSettings) {
        self.rewards.update_settings(settings);
    }

    pub fn reset_usage(&mut self, now: DateTime<Local>) {
        self.sync_day(now);
        self.usage.reset_today(now);
    }

    pub fn usage_report(&mut self, now: DateTime<Local>) -> UsageReport {
        self.sync_day(now);

        let limits = &self.parental.limits;
        let extra_minutes = self.rewards.extra_minutes_today();
        let today = now.date_naive();

        UsageReport {
            date: today,
            minutes_used_today: self.usage.minutes_used_today(now),
            remaining_minutes: self.usage.remaining_minutes(limits, extra_minutes, now),
            daily_limit_minutes: limits.daily_limit_minutes,
            extra_minutes_today: extra_minutes,
            current_session_minutes: self.usage.current_session_minutes(now),
            skips_this_hour: self.usage.skips_this_hour(now),
            skip_limit_this_hour: limits.skip_limit_per_hour + self.rewards.extra_skips_today(),
            within_schedule: self.schedule.is_within_schedule(now),
            points: self.rewards.points(),
            sessions_today: self
                .usage
                .stats()
                .sessions
                .iter()
                .filter(|s| s.start.date_naive() == today)
                .cloned()
                .collect(),
            top_favorites: self
                .usage
                .top_favorites(TOP_FAVORITES)
                .into_iter()
                .map(|(title, plays)| FavoriteSong { title, plays })
                .collect(),
        }
    }

    fn sync_day(&mut self, now: DateTime<Local>) {
        self.usage.roll_over_if_needed(now);
        self.apply_rollover();
    }

    fn apply_rollover(&mut self) {
        if self.usage.take_rollover() {
            debug!("Day rolled over, starting a new rewards day");
            self.rewards.start_new_day();
        }
    }

    fn accrue_open_session(&mut self, now: DateTime<Local>) {
        if let Some(session) = self.usage.stats().open_session() {
            let start = session.start;
            self.rewards.accrue_listening(now, start);
        }
    }

    fn settle_bonus(&mut self, summary: &SessionSummary) {
        if summary.earned_no_skip_bonus {
            self.rewards.award_no_skip_bonus();
        }
    }
}
