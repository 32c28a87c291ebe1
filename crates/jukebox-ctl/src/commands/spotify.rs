use anyhow::Result;
use jukebox_proto::api::{
    AuthorizeUrlResponse, SpotifyCredentials, SpotifyDevicesResponse, SpotifyStatus,
    TransferPlaybackRequest,
};

use super::yes_no;
use crate::client::ApiClient;

pub async fn status(client: &ApiClient) -> Result<()> {
    let status: SpotifyStatus = client.get("/admin/spotify").await?;
    print_status(&status);
    Ok(())
}

pub async fn configure(
    client: &ApiClient,
    client_id: &str,
    client_secret: &str,
    redirect_uri: Option<String>,
) -> Result<()> {
    let credentials = SpotifyCredentials {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        redirect_uri,
    };
    let status: SpotifyStatus = client.put("/admin/spotify", &credentials).await?;
    println!("Spotify credentials saved.\n");
    print_status(&status);
    Ok(())
}

pub async fn authorize(client: &ApiClient) -> Result<()> {
    let response: AuthorizeUrlResponse = client.get("/admin/spotify/authorize").await?;
    println!("Open this link in a browser and sign in to Spotify:");
    println!();
    println!("  {}", response.url);
    Ok(())
}

pub async fn devices(client: &ApiClient) -> Result<()> {
    let response: SpotifyDevicesResponse = client.get("/admin/spotify/devices").await?;
    if response.devices.is_empty() {
        println!("No Spotify Connect devices online");
    }
    for device in &response.devices {
        let marker = if device.is_active { "*" } else { " " };
        let volume = device.volume_percent.map(|v| format!("{}%", v)).unwrap_or_default();
        println!(
            "{} {:<24} {:<12} {:>4}  {}",
            marker,
            device.name,
            device.device_type,
            volume,
            device.id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn transfer(client: &ApiClient, device_id: &str) -> Result<()> {
    let request = TransferPlaybackRequest { device_id: device_id.to_string() };
    client.post_action("/admin/spotify/transfer", &request).await?;
    println!("Playback moved to {}", device_id);
    Ok(())
}

fn print_status(status: &SpotifyStatus) {
    println!("Configured:   {}", yes_no(status.configured));
    println!("Authorized:   {}", yes_no(status.authorized));
    if let Some(client_id) = &status.client_id {
        println!("Client ID:    {}", client_id);
    }
    println!("Redirect URI: {}", status.redirect_uri);
}
