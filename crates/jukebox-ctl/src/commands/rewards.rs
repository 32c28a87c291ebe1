use anyhow::{anyhow, Result};
use clap::ValueEnum;
use jukebox_common::{Reward, RewardType, RewardsSettings};
use jukebox_proto::api::{
    AdjustPointsRequest, PointsResponse, RedeemRequest, RedeemResponse, RewardsResponse,
};

use crate::client::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RewardKind {
    ExtraTime,
    ExtraSkips,
    Custom,
}

impl From<RewardKind> for RewardType {
    fn from(kind: RewardKind) -> Self {
        match kind {
            RewardKind::ExtraTime => RewardType::ExtraTime,
            RewardKind::ExtraSkips => RewardType::ExtraSkips,
            RewardKind::Custom => RewardType::Custom,
        }
    }
}

pub async fn show(client: &ApiClient) -> Result<()> {
    let rewards: RewardsResponse = client.get("/rewards").await?;

    println!("Rewards enabled: {}", super::yes_no(rewards.enabled));
    println!("Points:          {:.1}", rewards.points);
    println!(
        "Earning:         {} per minute, {} daily bonus, {} for a session without skips",
        rewards.points_per_minute, rewards.daily_login_bonus, rewards.no_skip_bonus
    );

    println!("\nAvailable rewards:");
    if rewards.rewards_available.is_empty() {
        println!("  (none)");
    }
    for reward in &rewards.rewards_available {
        println!("  {:<24} {:>4} pts  {}", reward.name, reward.cost, describe(reward));
    }

    if !rewards.redeemed_today.is_empty() {
        println!("\nRedeemed today:");
        for redemption in &rewards.redeemed_today {
            println!("  {}  {}", redemption.redeemed_at.format("%H:%M"), redemption.name);
        }
    }
    Ok(())
}

pub async fn redeem(client: &ApiClient, name: &str) -> Result<()> {
    let response: RedeemResponse =
        client.post("/rewards/redeem", &RedeemRequest { name: name.to_string() }).await?;
    println!(
        "Redeemed '{}' for {} points. {:.1} points left.",
        response.redemption.name, response.redemption.cost, response.points
    );
    Ok(())
}

pub async fn adjust(client: &ApiClient, delta: f64) -> Result<()> {
    let response: PointsResponse =
        client.post("/admin/rewards/adjust", &AdjustPointsRequest { delta }).await?;
    println!("Points are now {:.1}", response.points);
    Ok(())
}

pub async fn reset(client: &ApiClient) -> Result<()> {
    let rewards: RewardsResponse =
        client.post("/admin/rewards/reset", &serde_json::json!({})).await?;
    println!("Points reset to {:.1}", rewards.points);
    Ok(())
}

/// Fetch the current settings, let `edit` change them and store the result
pub async fn update<F>(client: &ApiClient, edit: F) -> Result<()>
where
    F: FnOnce(&mut RewardsSettings) -> Result<()>,
{
    let current: RewardsResponse = client.get("/rewards").await?;
    let mut settings = settings_from(current);
    edit(&mut settings)?;

    let rewards: RewardsResponse = client.put("/admin/rewards", &settings).await?;
    println!("Reward settings saved.");
    println!(
        "Enabled: {}, {} reward(s) available",
        super::yes_no(rewards.enabled),
        rewards.rewards_available.len()
    );
    Ok(())
}

pub fn add_reward(settings: &mut RewardsSettings, reward: Reward) -> Result<()> {
    if settings.rewards_available.iter().any(|r| r.name.eq_ignore_ascii_case(&reward.name)) {
        return Err(anyhow!("A reward named '{}' already exists", reward.name));
    }
    settings.rewards_available.push(reward);
    Ok(())
}

pub fn remove_reward(settings: &mut RewardsSettings, name: &str) -> Result<()> {
    let before = settings.rewards_available.len();
    settings.rewards_available.retain(|r| !r.name.eq_ignore_ascii_case(name));
    if settings.rewards_available.len() == before {
        return Err(anyhow!("No reward named '{}'", name));
    }
    Ok(())
}

fn settings_from(rewards: RewardsResponse) -> RewardsSettings {
    RewardsSettings {
        enabled: rewards.enabled,
        rewards_available: rewards.rewards_available,
        points_per_minute: rewards.points_per_minute,
        daily_login_bonus: rewards.daily_login_bonus,
        no_skip_bonus: rewards.no_skip_bonus,
    }
}

fn describe(reward: &Reward) -> String {
    match reward.reward_type {
        RewardType::ExtraTime => format!("+{} minutes today", reward.value),
        RewardType::ExtraSkips => format!("+{} skips per hour", reward.value),
        RewardType::Custom => "ask a parent".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RewardsSettings {
        RewardsSettings {
            enabled: true,
            rewards_available: vec![Reward {
                name: "Extra 15 minutes".to_string(),
                cost: 20,
                reward_type: RewardType::ExtraTime,
                value: 15,
            }],
            points_per_minute: 1.0,
            daily_login_bonus: 5.0,
            no_skip_bonus: 10.0,
        }
    }

    #[test]
    fn test_add_reward_rejects_duplicate_names() {
        let mut settings = settings();
        let duplicate = Reward {
            name: "extra 15 MINUTES".to_string(),
            cost: 5,
            reward_type: RewardType::Custom,
            value: 0,
        };
        assert!(add_reward(&mut settings, duplicate).is_err());
        assert_eq!(settings.rewards_available.len(), 1);
    }

    #[test]
    fn test_remove_reward() {
        let mut settings = settings();
        remove_reward(&mut settings, "Extra 15 minutes").unwrap();
        assert!(settings.rewards_available.is_empty());
        assert!(remove_reward(&mut settings, "Extra 15 minutes").is_err());
    }

    #[test]
    fn test_describe_reward() {
        assert_eq!(describe(&settings().rewards_available[0]), "+15 minutes today");
    }
}
