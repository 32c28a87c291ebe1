use anyhow::Result;
use clap::{Args, ValueEnum};
use jukebox_common::ParentalConfig;

use super::{format_minutes, yes_no};
use crate::client::ApiClient;

/// Fields left out keep their current value
#[derive(Debug, Default, Args)]
pub struct LimitChanges {
    #[arg(long, help = "Turn time and skip limits on or off")]
    pub enabled: Option<bool>,
    #[arg(long, help = "Minutes of music allowed per day")]
    pub daily: Option<u32>,
    #[arg(long, help = "Minutes allowed in one continuous session")]
    pub session: Option<u32>,
    #[arg(long, help = "Skips allowed per hour")]
    pub skips: Option<u32>,
    #[arg(long, help = "Volume cap in percent")]
    pub max_volume: Option<u8>,
    #[arg(long, help = "Block tracks marked explicit")]
    pub block_explicit: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListKind {
    Artist,
    Song,
    Album,
    Genre,
    AllowedGenre,
}

pub async fn show(client: &ApiClient) -> Result<()> {
    let config: ParentalConfig = client.get("/admin/parental").await?;
    print_config(&config);
    Ok(())
}

pub async fn set(client: &ApiClient, changes: &LimitChanges) -> Result<()> {
    let mut config: ParentalConfig = client.get("/admin/parental").await?;
    apply_changes(&mut config, changes);

    let config: ParentalConfig = client.put("/admin/parental", &config).await?;
    println!("Parental settings saved.\n");
    print_config(&config);
    Ok(())
}

/// Add or remove one entry of a block/allow list
pub async fn edit_list(client: &ApiClient, kind: ListKind, value: &str, add: bool) -> Result<()> {
    let mut config: ParentalConfig = client.get("/admin/parental").await?;
    let changed = edit_entry(&mut config, kind, value, add);
    if !changed {
        println!("Nothing to change.");
        return Ok(());
    }

    client.put::<_, ParentalConfig>("/admin/parental", &config).await?;
    println!("{} '{}'", if add { "Added" } else { "Removed" }, value);
    Ok(())
}

fn apply_changes(config: &mut ParentalConfig, changes: &LimitChanges) {
    let limits = &mut config.limits;
    if let Some(enabled) = changes.enabled {
        limits.enabled = enabled;
    }
    if let Some(daily) = changes.daily {
        limits.daily_limit_minutes = daily;
    }
    if let Some(session) = changes.session {
        limits.session_limit_minutes = session;
    }
    if let Some(skips) = changes.skips {
        limits.skip_limit_per_hour = skips;
    }
    if let Some(max_volume) = changes.max_volume {
        limits.max_volume = max_volume;
    }
    if let Some(block) = changes.block_explicit {
        config.content_filter.explicit_blocked = block;
    }
}

/// Returns false when the list already had (or lacked) the entry
fn edit_entry(config: &mut ParentalConfig, kind: ListKind, value: &str, add: bool) -> bool {
    let filter = &mut config.content_filter;
    let list = match kind {
        ListKind::Artist => &mut filter.blocked_artists,
        ListKind::Song => &mut filter.blocked_songs,
        ListKind::Album => &mut filter.blocked_albums,
        ListKind::Genre => &mut filter.blocked_genres,
        ListKind::AllowedGenre => &mut filter.allowed_genres,
    };

    let existing = list.iter().position(|entry| entry.eq_ignore_ascii_case(value));
    match (add, existing) {
        (true, None) => {
            list.push(value.to_string());
            true
        }
        (false, Some(index)) => {
            list.remove(index);
            true
        }
        _ => false,
    }
}

fn print_config(config: &ParentalConfig) {
    let limits = &config.limits;
    let filter = &config.content_filter;

    println!("Limits enabled:   {}", yes_no(limits.enabled));
    println!("Daily limit:      {}", format_minutes(limits.daily_limit_minutes as f64));
    println!("Session limit:    {}", format_minutes(limits.session_limit_minutes as f64));
    println!("Skips per hour:   {}", limits.skip_limit_per_hour);
    println!("Max volume:       {}%", limits.max_volume);
    println!("Block explicit:   {}", yes_no(filter.explicit_blocked));

    let lists = [
        ("Blocked artists", &filter.blocked_artists),
        ("Blocked songs", &filter.blocked_songs),
        ("Blocked albums", &filter.blocked_albums),
        ("Blocked genres", &filter.blocked_genres),
        ("Allowed genres", &filter.allowed_genres),
    ];
    for (label, entries) in lists {
        if !entries.is_empty() {
            println!("{:<17} {}", format!("{}:", label), entries.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_only_given_changes() {
        let mut config = ParentalConfig::default();
        let before = config.limits.session_limit_minutes;

        let changes = LimitChanges { daily: Some(45), max_volume: Some(60), ..Default::default() };
        apply_changes(&mut config, &changes);

        assert_eq!(config.limits.daily_limit_minutes, 45);
        assert_eq!(config.limits.max_volume, 60);
        assert_eq!(config.limits.session_limit_minutes, before);
    }

    #[test]
    fn test_edit_entry_ignores_case_and_duplicates() {
        let mut config = ParentalConfig::default();

        assert!(edit_entry(&mut config, ListKind::Artist, "Loud Band", true));
        assert!(!edit_entry(&mut config, ListKind::Artist, "loud band", true));
        assert!(edit_entry(&mut config, ListKind::Artist, "LOUD BAND", false));
        assert!(config.content_filter.blocked_artists.is_empty());
        assert!(!edit_entry(&mut config, ListKind::Genre, "polka", false));
    }
}
