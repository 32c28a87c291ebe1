// Spotify Web API client
//
// Authorization-code OAuth flow with the token persisted to
// `spotify_token.json`, plus the handful of player endpoints the kiosk needs.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, Utc};
use jukebox_common::{JsonStore, PlaybackSnapshot, Track};
use jukebox_proto::api::SpotifyDevice;
use lru::LruCache;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SpotifyConfig;

const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";
/// Refresh this long before the token actually expires
const REFRESH_MARGIN_SECS: i64 = 60;
const MAX_SEARCH_LIMIT: u32 = 50;
/// Artists whose genres are remembered between lookups
const GENRE_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(capacity) => capacity,
    None => panic!("genre cache capacity must be non-zero"),
};

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Spotify client credentials are not configured")]
    NotConfigured,

    #[error("Spotify account is not authorized")]
    NotAuthorized,

    #[error("No active Spotify device")]
    NoActiveDevice,

    #[error("Spotify API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type SpotifyResult<T> = std::result::Result<T, SpotifyError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scope: Option<String>,
}

impl SpotifyToken {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

/// Everything the kiosk asks of the music backend
#[async_trait]
pub trait MusicService: Send + Sync {
    async fn is_authorized(&self) -> bool;

    /// Replace the app credentials; a stored token stays valid
    async fn configure(&self, client_id: String, client_secret: String, redirect_uri: String);

    async fn authorize_url(&self, state: &str) -> SpotifyResult<String>;

    async fn exchange_code(&self, code: &str) -> SpotifyResult<()>;

    async fn current_playback(&self) -> SpotifyResult<PlaybackSnapshot>;

    async fn play(&self) -> SpotifyResult<()>;

    async fn play_track(&self, uri: &str) -> SpotifyResult<()>;

    async fn pause(&self) -> SpotifyResult<()>;

    async fn next(&self) -> SpotifyResult<()>;

    async fn previous(&self) -> SpotifyResult<()>;

    async fn set_volume(&self, volume_percent: u8) -> SpotifyResult<()>;

    async fn search(&self, query: &str, limit: u32) -> SpotifyResult<Vec<Track>>;

    async fn devices(&self) -> SpotifyResult<Vec<SpotifyDevice>>;

    async fn transfer_playback(&self, device_id: &str) -> SpotifyResult<()>;

    /// Genres of the track's artists, used by genre content rules
    async fn track_genres(&self, track_id: &str) -> SpotifyResult<Vec<String>>;
}

#[derive(Debug, Clone)]
struct AppCredentials {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl AppCredentials {
    fn require(&self) -> SpotifyResult<(&str, &str)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Ok((id, secret)),
            _ => Err(SpotifyError::NotConfigured),
        }
    }
}

pub struct SpotifyClient {
    http: Client,
    app: RwLock<AppCredentials>,
    token: RwLock<Option<SpotifyToken>>,
    token_store: JsonStore<Option<SpotifyToken>>,
    genre_cache: Mutex<GenreCache>,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, token_path: PathBuf) -> Self {
        let token_store = JsonStore::new(token_path);
        let token: Option<SpotifyToken> = token_store.load_or_recover();
        if token.is_some() {
            info!("Loaded stored Spotify token");
        }

        Self {
            http: Client::new(),
            app: RwLock::new(AppCredentials {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                redirect_uri: config.redirect_uri.clone(),
                scopes: config.scopes.clone(),
            }),
            token: RwLock::new(token),
            token_store,
            genre_cache: Mutex::new(GenreCache::new(GENRE_CACHE_CAPACITY)),
        }
    }

    async fn access_token(&self) -> SpotifyResult<String> {
        {
            let token = self.token.read().await;
            match token.as_ref() {
                None => return Err(SpotifyError::NotAuthorized),
                Some(t) if !t.needs_refresh(Utc::now()) => return Ok(t.access_token.clone()),
                Some(_) => {}
            }
        }
        self.refresh().await
    }

    /// Exchange the refresh token for a new access token
    pub async fn refresh(&self) -> SpotifyResult<String> {
        let refresh_token = {
            let token = self.token.read().await;
            token.as_ref().and_then(|t| t.refresh_token.clone()).ok_or(SpotifyError::NotAuthorized)?
        };

        debug!("Refreshing Spotify access token");
        let params = [("grant_type", "refresh_token"), ("refresh_token", refresh_token.as_str())];
        let mut token = self.request_token(&params).await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token);
        }

        let access = token.access_token.clone();
        self.store_token(token).await;
        Ok(access)
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> SpotifyResult<SpotifyToken> {
        let app = self.app.read().await;
        let (client_id, client_secret) = app.require()?;

        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(client_id, Some(client_secret))
            .form(params)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: TokenResponse = response.json().await?;

        Ok(SpotifyToken {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
            scope: body.scope,
        })
    }

    async fn store_token(&self, token: SpotifyToken) {
        let token = Some(token);
        if let Err(e) = self.token_store.save(&token) {
            warn!("Failed to persist Spotify token: {}", e);
        }
        *self.token.write().await = token;
    }

    async fn api(&self, method: Method, path: &str) -> SpotifyResult<RequestBuilder> {
        let access_token = self.access_token().await?;
        Ok(self.http.request(method, format!("{}{}", API_URL, path)).bearer_auth(access_token))
    }

    async fn send(&self, request: RequestBuilder) -> SpotifyResult<Response> {
        let response = request.send().await?;
        check_status(response).await
    }

    /// Player commands answer 204 with no body
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> SpotifyResult<()> {
        let mut request = self.api(method, path).await?;
        request = match body {
            Some(body) => request.json(&body),
            // Spotify rejects PUT/POST without a length
            None => request.header(reqwest::header::CONTENT_LENGTH, 0),
        };
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl MusicService for SpotifyClient {
    async fn is_authorized(&self) -> bool {
        self.token.read().await.is_some()
    }

    async fn configure(&self, client_id: String, client_secret: String, redirect_uri: String) {
        let mut app = self.app.write().await;
        app.client_id = Some(client_id);
        app.client_secret = Some(client_secret);
        app.redirect_uri = redirect_uri;
        info!("Spotify client credentials updated");
    }

    async fn authorize_url(&self, state: &str) -> SpotifyResult<String> {
        let app = self.app.read().await;
        let (client_id, _) = app.require()?;
        let scopes = app.scopes.join(" ");

        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", client_id),
                ("response_type", "code"),
                ("redirect_uri", app.redirect_uri.as_str()),
                ("scope", scopes.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> SpotifyResult<()> {
        let redirect_uri = self.app.read().await.redirect_uri.clone();
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let token = self.request_token(&params).await?;
        self.store_token(token).await;
        info!("Spotify account authorized");
        Ok(())
    }

    async fn current_playback(&self) -> SpotifyResult<PlaybackSnapshot> {
        let response = self.send(self.api(Method::GET, "/me/player").await?).await?;
        let now = Local::now();

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(PlaybackSnapshot::idle(now));
        }

        let payload: PlayerPayload = response.json().await?;
        Ok(payload.into_snapshot(now))
    }

    async fn play(&self) -> SpotifyResult<()> {
        self.command(Method::PUT, "/me/player/play", None).await
    }

    async fn play_track(&self, uri: &str) -> SpotifyResult<()> {
        self.command(Method::PUT, "/me/player/play", Some(json!({ "uris": [uri] }))).await
    }

    async fn pause(&self) -> SpotifyResult<()> {
        self.command(Method::PUT, "/me/player/pause", None).await
    }

    async fn next(&self) -> SpotifyResult<()> {
        self.command(Method::POST, "/me/player/next", None).await
    }

    async fn previous(&self) -> SpotifyResult<()> {
        self.command(Method::POST, "/me/player/previous", None).await
    }

    async fn set_volume(&self, volume_percent: u8) -> SpotifyResult<()> {
        let path = format!("/me/player/volume?volume_percent={}", volume_percent.min(100));
        self.command(Method::PUT, &path, None).await
    }

    async fn search(&self, query: &str, limit: u32) -> SpotifyResult<Vec<Track>> {
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT).to_string();
        let request = self
            .api(Method::GET, "/search")
            .await?
            .query(&[("q", query), ("type", "track"), ("limit", limit.as_str())]);

        let payload: SearchPayload = self.send(request).await?.json().await?;
        Ok(payload.tracks.items.into_iter().map(Track::from).collect())
    }

    async fn devices(&self) -> SpotifyResult<Vec<SpotifyDevice>> {
        let request = self.api(Method::GET, "/me/player/devices").await?;
        let payload: DevicesPayload = self.send(request).await?.json().await?;
        Ok(payload.devices.into_iter().map(SpotifyDevice::from).collect())
    }

    async fn transfer_playback(&self, device_id: &str) -> SpotifyResult<()> {
        let body = json!({ "device_ids": [device_id], "play": true });
        self.command(Method::PUT, "/me/player", Some(body)).await
    }

    async fn track_genres(&self, track_id: &str) -> SpotifyResult<Vec<String>> {
        let request = self.api(Method::GET, &format!("/tracks/{}", track_id)).await?;
        let track: TrackPayload = self.send(request).await?.json().await?;
        let ids: Vec<String> = track.artists.iter().filter_map(|a| a.id.clone()).collect();

        let missing = self.genre_cache.lock().await.missing(&ids);
        if !missing.is_empty() {
            debug!("Looking up genres for {} artist(s)", missing.len());
            let request = self
                .api(Method::GET, "/artists")
                .await?
                .query(&[("ids", missing.join(","))]);
            let payload: ArtistsPayload = self.send(request).await?.json().await?;

            let mut cache = self.genre_cache.lock().await;
            for artist in payload.artists.into_iter().flatten() {
                if let Some(id) = artist.id {
                    cache.insert(id, artist.genres);
                }
            }
        }

        Ok(self.genre_cache.lock().await.genres_for(&ids))
    }
}

/// Genres per artist id, least recently used entries evicted first
struct GenreCache {
    artists: LruCache<String, Vec<String>>,
}

impl GenreCache {
    fn new(capacity: NonZeroUsize) -> Self {
        Self { artists: LruCache::new(capacity) }
    }

    fn missing(&self, ids: &[String]) -> Vec<String> {
        ids.iter().filter(|id| !self.artists.contains(*id)).cloned().collect()
    }

    fn insert(&mut self, artist_id: String, genres: Vec<String>) {
        self.artists.put(artist_id, genres);
    }

    /// Union of the cached genres of `ids`, in artist order
    fn genres_for(&mut self, ids: &[String]) -> Vec<String> {
        let mut genres: Vec<String> = Vec::new();
        for id in ids {
            for genre in self.artists.get(id).into_iter().flatten() {
                if !genres.contains(genre) {
                    genres.push(genre.clone());
                }
            }
        }
        genres
    }
}

async fn check_status(response: Response) -> SpotifyResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorPayload>(&body)
        .map(|e| e.message())
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED => Err(SpotifyError::NotAuthorized),
        StatusCode::NOT_FOUND if message.contains("NO_ACTIVE_DEVICE") => {
            Err(SpotifyError::NoActiveDevice)
        }
        _ => Err(SpotifyError::Api { status: status.as_u16(), message }),
    }
}

// ============================================================================
// Wire payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Api { error: ApiErrorBody },
    OAuth { error: String, error_description: Option<String> },
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    reason: Option<String>,
}

impl ErrorPayload {
    fn message(self) -> String {
        match self {
            ErrorPayload::Api { error } => match error.reason {
                Some(reason) => format!("{} ({})", error.message, reason),
                None => error.message,
            },
            ErrorPayload::OAuth { error, error_description } => {
                error_description.map(|d| format!("{}: {}", error, d)).unwrap_or(error)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlayerPayload {
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<TrackPayload>,
    device: Option<DevicePayload>,
}

impl PlayerPayload {
    fn into_snapshot(self, fetched_at: DateTime<Local>) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_playing: self.is_playing,
            track: self.item.map(Track::from),
            progress_ms: self.progress_ms.unwrap_or(0),
            volume_percent: self.device.as_ref().and_then(|d| d.volume_percent),
            device_name: self.device.map(|d| d.name),
            fetched_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrackPayload {
    id: Option<String>,
    uri: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistPayload>,
    album: Option<AlbumPayload>,
    #[serde(default)]
    explicit: bool,
    #[serde(default)]
    duration_ms: u64,
}

impl From<TrackPayload> for Track {
    fn from(payload: TrackPayload) -> Self {
        Track {
            id: payload.id.unwrap_or_default(),
            uri: payload.uri,
            name: payload.name,
            artists: payload.artists.into_iter().map(|a| a.name).collect(),
            album: payload.album.map(|a| a.name),
            explicit: payload.explicit,
            genres: Vec::new(),
            duration_ms: payload.duration_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArtistPayload {
    id: Option<String>,
    name: String,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DevicePayload {
    id: Option<String>,
    name: String,
    #[serde(rename = "type", default)]
    device_type: String,
    #[serde(default)]
    is_active: bool,
    volume_percent: Option<u8>,
}

impl From<DevicePayload> for SpotifyDevice {
    fn from(payload: DevicePayload) -> Self {
        SpotifyDevice {
            id: payload.id,
            name: payload.name,
            device_type: payload.device_type,
            is_active: payload.is_active,
            volume_percent: payload.volume_percent,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    tracks: Paging<TrackPayload>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct DevicesPayload {
    devices: Vec<DevicePayload>,
}

#[derive(Debug, Deserialize)]
struct ArtistsPayload {
    artists: Vec<Option<ArtistPayload>>,
}
