use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::JsonStore;
use crate::types::{Redemption, Reward, RewardType, RewardsState};

/// Parent-editable part of `RewardsState`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardsSettings {
    pub enabled: bool,
    pub rewards_available: Vec<Reward>,
    pub points_per_minute: f64,
    pub daily_login_bonus: f64,
    pub no_skip_bonus: f64,
}

/// Point ledger backed by `rewards.json`.
///
/// Accrual is additive. Redemptions deduct their cost and are remembered for the
/// rest of the day so their effects (extra minutes, extra skips) can be applied.
pub struct RewardsLedger {
    state: RewardsState,
    store: JsonStore<RewardsState>,
}

impl RewardsLedger {
    pub fn load(store: JsonStore<RewardsState>) -> Self {
        let state = store.load_or_recover();
        Self { state, store }
    }

    pub fn state(&self) -> &RewardsState {
        &self.state
    }

    pub fn points(&self) -> f64 {
        self.state.points
    }

    /// Credit points for listening since the later of the last accrual and the
    /// session start. Returns the points awarded.
    pub fn accrue_listening(
        &mut self,
        now: DateTime<Local>,
        session_start: DateTime<Local>,
    ) -> f64 {
        if !self.state.enabled {
            return 0.0;
        }

        let from = match self.state.last_accrual {
            Some(last) if last > session_start => last,
            _ => session_start,
        };
        let minutes = (now - from).num_seconds().max(0) as f64 / 60.0;
        let awarded = minutes * self.state.points_per_minute;

        self.state.points += awarded;
        self.state.last_accrual = Some(now);
        self.persist();

        debug!("Accrued {:.2} points for {:.1} listening minutes", awarded, minutes);
        awarded
    }

    pub fn award_no_skip_bonus(&mut self) -> f64 {
        if !self.state.enabled {
            return 0.0;
        }

        let bonus = self.state.no_skip_bonus;
        self.state.points += bonus;
        self.persist();

        info!("Awarded no-skip bonus of {} points", bonus);
        bonus
    }

    /// Daily rollover: clear today's redemptions and credit the login bonus.
    /// `last_accrual` survives so a session spanning midnight is not paid twice.
    pub fn start_new_day(&mut self) {
        self.state.redeemed_today.clear();

        if self.state.enabled {
            self.state.points += self.state.daily_login_bonus;
            info!("Credited daily login bonus of {} points", self.state.daily_login_bonus);
        }

        self.persist();
    }

    pub fn redeem(&mut self, name: &str, now: DateTime<Local>) -> Result<Redemption> {
        if !self.state.enabled {
            return Err(Error::RewardsDisabled);
        }

        let reward = self
            .state
            .rewards_available
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| Error::RewardNotFound(name.to_string()))?;

        if self.state.points < reward.cost as f64 {
            return Err(Error::InsufficientPoints {
                required: reward.cost,
                available: self.state.points,
            });
        }

        self.state.points -= reward.cost as f64;
        let redemption = Redemption {
            name: reward.name,
            cost: reward.cost,
            reward_type: reward.reward_type,
            value: reward.value,
            redeemed_at: now,
        };
        self.state.redeemed_today.push(redemption.clone());
        self.persist();

        info!("Redeemed '{}' for {} points", redemption.name, redemption.cost);
        Ok(redemption)
    }

    /// Manual correction by a parent. Not floored.
    pub fn adjust_points(&mut self, delta: f64) -> f64 {
        self.state.points += delta;
        self.persist();
        info!("Adjusted points by {} (balance {:.1})", delta, self.state.points);
        self.state.points
    }

    pub fn reset(&mut self) {
        self.state.points = 0.0;
        self.state.redeemed_today.clear();
        self.state.last_accrual = None;
        self.persist();
        info!("Rewards reset");
    }

    pub fn update_settings(&mut self, settings: RewardsSettings) {
        self.state.enabled = settings.enabled;
        self.state.rewards_available = settings.rewards_available;
        self.state.points_per_minute = settings.points_per_minute;
        self.state.daily_login_bonus = settings.daily_login_bonus;
        self.state.no_skip_bonus = settings.no_skip_bonus;
        self.persist();
    }

    pub fn extra_minutes_today(&self) -> u32 {
        self.redeemed_value(RewardType::ExtraTime)
    }

    pub fn extra_skips_today(&self) -> u32 {
        self.redeemed_value(RewardType::ExtraSkips)
    }

    fn redeemed_value(&self, reward_type: RewardType) -> u32 {
        self.state
            .redeemed_today
            .iter()
            .filter(|r| r.reward_type == reward_type)
            .map(|r| r.value)
            .sum()
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.state) {
            warn!("Failed to persist rewards to {:?}: {}", self.store.path(), e);
        }
    }
}
