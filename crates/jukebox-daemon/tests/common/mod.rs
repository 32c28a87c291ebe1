#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Local;
use jukebox_common::{PlaybackSnapshot, Track};
use jukebox_daemon::config::DaemonConfig;
use jukebox_daemon::spotify::{MusicService, SpotifyError, SpotifyResult};
use jukebox_daemon::KioskService;
use jukebox_proto::api::SpotifyDevice;
use tempfile::{tempdir, TempDir};

#[derive(Debug, Default)]
pub struct MockState {
    pub authorized: bool,
    pub configured: bool,
    pub playback: Option<PlaybackSnapshot>,
    pub volume: Option<u8>,
    pub search_results: Vec<Track>,
    pub genres: HashMap<String, Vec<String>>,
    pub exchanged_code: Option<String>,
    pub calls: Vec<String>,
}

/// In-memory stand-in for the Spotify client
#[derive(Debug, Default)]
pub struct MockMusic {
    pub state: Mutex<MockState>,
}

impl MockMusic {
    pub fn authorized() -> Self {
        let music = Self::default();
        music.state.lock().unwrap().authorized = true;
        music
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }

    fn require_auth(&self) -> SpotifyResult<()> {
        if self.state.lock().unwrap().authorized {
            Ok(())
        } else {
            Err(SpotifyError::NotAuthorized)
        }
    }
}

#[async_trait]
impl MusicService for MockMusic {
    async fn is_authorized(&self) -> bool {
        self.state.lock().unwrap().authorized
    }

    async fn configure(&self, client_id: String, _client_secret: String, _redirect_uri: String) {
        self.record(format!("configure:{}", client_id));
        self.state.lock().unwrap().configured = true;
    }

    async fn authorize_url(&self, state: &str) -> SpotifyResult<String> {
        if !self.state.lock().unwrap().configured {
            return Err(SpotifyError::NotConfigured);
        }
        Ok(format!("https://accounts.spotify.com/authorize?state={}", state))
    }

    async fn exchange_code(&self, code: &str) -> SpotifyResult<()> {
        let mut state = self.state.lock().unwrap();
        state.exchanged_code = Some(code.to_string());
        state.authorized = true;
        Ok(())
    }

    async fn current_playback(&self) -> SpotifyResult<PlaybackSnapshot> {
        self.require_auth()?;
        let state = self.state.lock().unwrap();
        Ok(state.playback.clone().unwrap_or_else(|| PlaybackSnapshot::idle(Local::now())))
    }

    async fn play(&self) -> SpotifyResult<()> {
        self.require_auth()?;
        self.record("play");
        Ok(())
    }

    async fn play_track(&self, uri: &str) -> SpotifyResult<()> {
        self.require_auth()?;
        self.record(format!("play_track:{}", uri));
        Ok(())
    }

    async fn pause(&self) -> SpotifyResult<()> {
        self.require_auth()?;
        self.record("pause");
        Ok(())
    }

    async fn next(&self) -> SpotifyResult<()> {
        self.require_auth()?;
        self.record("next");
        Ok(())
    }

    async fn previous(&self) -> SpotifyResult<()> {
        self.require_auth()?;
        self.record("previous");
        Ok(())
    }

    async fn set_volume(&self, volume_percent: u8) -> SpotifyResult<()> {
        self.require_auth()?;
        self.record(format!("volume:{}", volume_percent));
        self.state.lock().unwrap().volume = Some(volume_percent);
        Ok(())
    }

    async fn search(&self, _query: &str, limit: u32) -> SpotifyResult<Vec<Track>> {
        self.require_auth()?;
        let state = self.state.lock().unwrap();
        Ok(state.search_results.iter().take(limit as usize).cloned().collect())
    }

    async fn devices(&self) -> SpotifyResult<Vec<SpotifyDevice>> {
        self.require_auth()?;
        Ok(vec![SpotifyDevice {
            id: Some("dev1".to_string()),
            name: "Family Jukebox".to_string(),
            device_type: "Speaker".to_string(),
            is_active: true,
            volume_percent: Some(50),
        }])
    }

    async fn transfer_playback(&self, device_id: &str) -> SpotifyResult<()> {
        self.require_auth()?;
        self.record(format!("transfer:{}", device_id));
        Ok(())
    }

    async fn track_genres(&self, track_id: &str) -> SpotifyResult<Vec<String>> {
        self.record(format!("genres:{}", track_id));
        Ok(self.state.lock().unwrap().genres.get(track_id).cloned().unwrap_or_default())
    }
}

pub struct Harness {
    pub service: Arc<KioskService>,
    pub music: Arc<MockMusic>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_music(MockMusic::authorized())
    }

    pub fn with_music(music: MockMusic) -> Self {
        let dir = tempdir().unwrap();
        let mut config = DaemonConfig::default();
        config.general.data_dir = Some(dir.path().join("data").to_string_lossy().to_string());
        config.system.dry_run = true;

        let music = Arc::new(music);
        let service = KioskService::with_music_service(
            config,
            dir.path().join("daemon.toml"),
            music.clone() as Arc<dyn MusicService>,
        )
        .unwrap();

        Self { service, music, dir }
    }
}

pub fn track(id: &str, name: &str, artist: &str) -> Track {
    Track {
        id: id.to_string(),
        uri: format!("spotify:track:{}", id),
        name: name.to_string(),
        artists: vec![artist.to_string()],
        album: Some("Album".to_string()),
        explicit: false,
        genres: Vec::new(),
        duration_ms: 180_000,
    }
}

pub fn playing(track: Track) -> PlaybackSnapshot {
    PlaybackSnapshot {
        is_playing: true,
        track: Some(track),
        progress_ms: 0,
        volume_percent: Some(50),
        device_name: Some("Family Jukebox".to_string()),
        fetched_at: Local::now(),
    }
}

pub fn paused(track: Track) -> PlaybackSnapshot {
    PlaybackSnapshot { is_playing: false, ..playing(track) }
}
