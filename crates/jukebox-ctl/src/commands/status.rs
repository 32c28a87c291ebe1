use anyhow::Result;
use jukebox_common::PlaybackSnapshot;
use jukebox_proto::api::StatusResponse;

use super::{format_minutes, yes_no};
use crate::client::ApiClient;

pub async fn show(client: &ApiClient) -> Result<()> {
    let status: StatusResponse = client.get("/status").await?;

    println!("Family Jukebox Status");
    println!("=====================");
    println!();
    println!("Daemon version:     {}", status.version);
    println!("Spotify authorized: {}", yes_no(status.spotify_authorized));
    println!("Within schedule:    {}", yes_no(status.within_schedule));
    if !status.admin_configured {
        println!("Parent password:    not set (run `jukebox-ctl setup`)");
    }

    if status.listening.allowed {
        println!("Listening:          allowed");
    } else {
        let reason = status.listening.reason.as_deref().unwrap_or("blocked");
        println!("Listening:          blocked ({})", reason);
        if let Some(next) = &status.listening.next_window {
            println!("Next window:        {}", next);
        }
    }

    match status.remaining_minutes {
        Some(minutes) => println!("Time left today:    {}", format_minutes(minutes)),
        None => println!("Time left today:    unlimited"),
    }

    if status.rewards_enabled {
        println!("Reward points:      {:.1}", status.points);
    }

    println!();
    println!("{}", describe_playback(status.playback.as_ref()));
    Ok(())
}

pub fn describe_playback(playback: Option<&PlaybackSnapshot>) -> String {
    let Some(snapshot) = playback else {
        return "Nothing playing".to_string();
    };
    let Some(track) = &snapshot.track else {
        return "Nothing playing".to_string();
    };

    let state = if snapshot.is_playing { "Playing" } else { "Paused" };
    let mut line = format!("{}: {}", state, track.favorite_key());
    if let Some(volume) = snapshot.volume_percent {
        line.push_str(&format!(" (volume {}%)", volume));
    }
    if let Some(device) = &snapshot.device_name {
        line.push_str(&format!(" on {}", device));
    }
    line
}
