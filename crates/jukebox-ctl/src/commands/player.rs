use anyhow::Result;
use jukebox_common::{PlaybackSnapshot, Track};
use jukebox_proto::api::{
    PlayTrackRequest, SearchQuery, SearchResponse, VolumeRequest, VolumeResponse,
};

use super::status::describe_playback;
use crate::client::ApiClient;

pub async fn current(client: &ApiClient) -> Result<()> {
    let playback: Option<PlaybackSnapshot> = client.get("/player/current").await?;
    println!("{}", describe_playback(playback.as_ref()));
    Ok(())
}

/// Send one of the bodiless transport commands: play, pause, next, previous
pub async fn transport(client: &ApiClient, action: &str) -> Result<()> {
    client.post_action(&format!("/player/{}", action), &serde_json::json!({})).await?;
    println!("OK: {}", action);
    Ok(())
}

pub async fn volume(client: &ApiClient, volume_percent: u8) -> Result<()> {
    let response: VolumeResponse =
        client.post("/player/volume", &VolumeRequest { volume_percent }).await?;

    if response.volume_percent < volume_percent {
        println!("Volume set to {}% (capped by parental limit)", response.volume_percent);
    } else {
        println!("Volume set to {}%", response.volume_percent);
    }
    Ok(())
}

pub async fn play_track(client: &ApiClient, uri: &str) -> Result<()> {
    client.post_action("/player/track", &PlayTrackRequest { uri: uri.to_string() }).await?;
    println!("Playing {}", uri);
    Ok(())
}

pub async fn search(client: &ApiClient, query: &str, limit: Option<u32>) -> Result<()> {
    let params = SearchQuery { q: query.to_string(), limit };
    let response: SearchResponse = client.get_query("/player/search", &params).await?;

    if response.tracks.is_empty() {
        println!("No tracks found for '{}'", query);
    } else {
        for (i, track) in response.tracks.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, track_line(track));
        }
    }

    if response.filtered_out > 0 {
        println!("\n{} result(s) hidden by the content filter", response.filtered_out);
    }
    Ok(())
}

fn track_line(track: &Track) -> String {
    let explicit = if track.explicit { " [E]" } else { "" };
    format!("{}{}  {}", track.favorite_key(), explicit, track.uri)
}
