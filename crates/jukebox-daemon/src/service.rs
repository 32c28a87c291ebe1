// Kiosk service
//
// The one object the REST handlers, the playback poller and the enforcement task
// share. It owns the music backend, the playback snapshot, the parental
// controls, OS integration and admin auth, and fans events out to `/ws`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use jukebox_common::{
    FilterDecision, ListeningDecision, ParentalConfig, ParentalControls, PlaybackSnapshot,
    RewardsSettings, ScheduleConfig, SessionSummary, SessionToken, Track, UsageReport,
};
use jukebox_proto::api::{
    AuthorizeUrlResponse, BluetoothDevicesResponse, CallbackQuery, CommandReport, LoginResponse,
    PlayerConfigRequest, PointsResponse, RedeemResponse, RepairCommand, RewardsResponse,
    SearchResponse, SpotifyCredentials, SpotifyDevice, SpotifyStatus, StatusResponse,
    VolumeResponse,
};
use jukebox_proto::Event;
use rand::{distributions::Alphanumeric, Rng};
use secrecy::SecretString;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::auth::AdminAuth;
use crate::bluetooth::{validate_address, DEFAULT_SCAN_SECS};
use crate::config::DaemonConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::spotify::{MusicService, SpotifyClient};
use crate::system_control::{render_spotifyd_config, SystemControl};

const EVENT_CHANNEL_CAPACITY: usize = 128;
const DEFAULT_SEARCH_LIMIT: u32 = 20;
const OAUTH_STATE_LENGTH: usize = 32;
const SKIP_LIMIT_REASON: &str = "Skip limit reached for this hour";

pub struct KioskService {
    config: RwLock<DaemonConfig>,
    config_path: PathBuf,
    music: Arc<dyn MusicService>,
    playback: RwLock<Option<PlaybackSnapshot>>,
    controls: Mutex<ParentalControls>,
    system: SystemControl,
    auth: Mutex<AdminAuth>,
    events: broadcast::Sender<Event>,
    oauth_state: Mutex<Option<String>>,
}

impl KioskService {
    /// Build the service with the real Spotify client
    pub fn init(config: DaemonConfig, config_path: PathBuf) -> Result<Arc<Self>> {
        let paths = config.data_paths();
        let music: Arc<dyn MusicService> =
            Arc::new(SpotifyClient::new(&config.spotify, paths.spotify_token()));
        Self::with_music_service(config, config_path, music)
    }

    pub fn with_music_service(
        config: DaemonConfig,
        config_path: PathBuf,
        music: Arc<dyn MusicService>,
    ) -> Result<Arc<Self>> {
        let paths = config.data_paths();
        std::fs::create_dir_all(paths.root())
            .with_context(|| format!("Failed to create data directory: {:?}", paths.root()))?;

        let controls = ParentalControls::load(&paths, Local::now());
        let system = SystemControl::new(&config.system, &config.player);
        let auth = AdminAuth::new(config.auth.admin_password_hash.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!("Kiosk service initialized (data dir: {:?})", paths.root());

        Ok(Arc::new(Self {
            config: RwLock::new(config),
            config_path,
            music,
            playback: RwLock::new(None),
            controls: Mutex::new(controls),
            system,
            auth: Mutex::new(auth),
            events,
            oauth_state: Mutex::new(None),
        }))
    }

    /// Close the open listening session so its minutes are persisted
    pub async fn shutdown(&self) {
        info!("Shutting down kiosk service");
        if let Some(summary) = self.finish_session(Local::now()).await {
            info!("Closed open session ({:.1} minutes)", summary.duration_minutes);
        }
    }

    pub fn music(&self) -> &Arc<dyn MusicService> {
        &self.music
    }

    pub fn system(&self) -> &SystemControl {
        &self.system
    }

    pub async fn config(&self) -> DaemonConfig {
        self.config.read().await.clone()
    }

    // ------------------------------------------------------------------------
    // Events and playback state
    // ------------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: Event) {
        if self.events.send(event).is_err() {
            debug!("No event subscribers");
        }
    }

    pub async fn current_playback(&self) -> Option<PlaybackSnapshot> {
        self.playback.read().await.clone()
    }

    /// Swap in a fresh snapshot and return the previous one
    pub async fn replace_playback(&self, snapshot: PlaybackSnapshot) -> Option<PlaybackSnapshot> {
        self.playback.write().await.replace(snapshot)
    }

    pub async fn is_playing(&self) -> bool {
        self.playback.read().await.as_ref().is_some_and(|p| p.is_playing)
    }

    // ------------------------------------------------------------------------
    // Parental controls, as used by the poller and enforcement task
    // ------------------------------------------------------------------------

    pub async fn evaluate(&self, now: DateTime<Local>) -> ListeningDecision {
        self.controls.lock().await.evaluate(now)
    }

    pub async fn upcoming_warning(
        &self,
        now: DateTime<Local>,
        warning_minutes: u32,
    ) -> Option<String> {
        self.controls.lock().await.upcoming_limit_warning(now, warning_minutes)
    }

    pub async fn check_track(&self, track: &Track) -> FilterDecision {
        self.controls.lock().await.check_track(track)
    }

    /// Whether genre rules exist, so genre lookups are worth the API calls
    pub async fn genre_rules_active(&self) -> bool {
        let controls = self.controls.lock().await;
        let filter = &controls.parental_config().content_filter;
        !filter.allowed_genres.is_empty() || !filter.blocked_genres.is_empty()
    }

    pub async fn has_open_session(&self) -> bool {
        self.controls.lock().await.has_open_session()
    }

    pub async fn record_song_play(&self, track: &Track, now: DateTime<Local>) {
        self.controls.lock().await.record_song_play(track, now);
    }

    pub async fn begin_session(&self, now: DateTime<Local>) {
        let previous = self.controls.lock().await.start_session(now);
        if let Some(summary) = previous {
            self.publish(session_ended(&summary));
        }
        info!("Listening session started");
        self.publish(Event::SessionStarted { timestamp: Utc::now() });
    }

    pub async fn finish_session(&self, now: DateTime<Local>) -> Option<SessionSummary> {
        let summary = self.controls.lock().await.end_session(now)?;
        info!(
            "Listening session ended: {:.1} minutes, {} songs, {} skips",
            summary.duration_minutes, summary.songs_played, summary.skips
        );
        self.publish(session_ended(&summary));
        Some(summary)
    }

    // ------------------------------------------------------------------------
    // Player
    // ------------------------------------------------------------------------

    pub async fn status(&self, now: DateTime<Local>) -> StatusResponse {
        let playback = self.current_playback().await;
        let spotify_authorized = self.music.is_authorized().await;
        let admin_configured = self.admin_configured().await;

        let mut controls = self.controls.lock().await;
        let listening = controls.evaluate(now);
        let report = controls.usage_report(now);

        StatusResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            spotify_authorized,
            playback,
            listening,
            remaining_minutes: report.remaining_minutes,
            within_schedule: report.within_schedule,
            points: report.points,
            rewards_enabled: controls.rewards_state().enabled,
            admin_configured,
        }
    }

    pub async fn play(&self, now: DateTime<Local>) -> ServiceResult<()> {
        self.ensure_listening_allowed(now).await?;
        self.music.play().await?;
        Ok(())
    }

    pub async fn play_track(&self, uri: &str, now: DateTime<Local>) -> ServiceResult<()> {
        if !uri.starts_with("spotify:track:") {
            return Err(ServiceError::bad_request(format!("Not a Spotify track URI: {}", uri)));
        }
        self.ensure_listening_allowed(now).await?;
        self.music.play_track(uri).await?;
        Ok(())
    }

    pub async fn pause(&self) -> ServiceResult<()> {
        self.music.pause().await?;
        Ok(())
    }

    /// A child-initiated skip, counted against the hourly cap
    pub async fn next(&self, now: DateTime<Local>) -> ServiceResult<()> {
        if !self.controls.lock().await.can_skip(now) {
            return Err(ServiceError::Blocked(SKIP_LIMIT_REASON.to_string()));
        }
        self.music.next().await?;
        self.controls.lock().await.record_skip(now);
        Ok(())
    }

    pub async fn previous(&self) -> ServiceResult<()> {
        self.music.previous().await?;
        Ok(())
    }

    pub async fn set_volume(&self, requested: u8) -> ServiceResult<VolumeResponse> {
        let volume_percent = self.controls.lock().await.clamp_volume(requested);
        if volume_percent != requested {
            debug!("Volume {} capped to {}", requested, volume_percent);
        }
        self.music.set_volume(volume_percent).await?;
        Ok(VolumeResponse { volume_percent })
    }

    /// Search results with blocked tracks removed
    pub async fn search(&self, query: &str, limit: Option<u32>) -> ServiceResult<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ServiceError::bad_request("Search query must not be empty"));
        }

        let results = self.music.search(query, limit.unwrap_or(DEFAULT_SEARCH_LIMIT)).await?;
        let total = results.len();

        let controls = self.controls.lock().await;
        let tracks: Vec<Track> =
            results.into_iter().filter(|t| controls.is_track_allowed(t)).collect();

        Ok(SearchResponse { filtered_out: total - tracks.len(), tracks })
    }

    async fn ensure_listening_allowed(&self, now: DateTime<Local>) -> ServiceResult<()> {
        let decision = self.evaluate(now).await;
        if decision.allowed {
            return Ok(());
        }

        let reason =
            decision.reason.unwrap_or_else(|| "Listening is not allowed right now".to_string());
        self.publish(Event::listening_blocked(reason.clone(), decision.next_window));
        Err(ServiceError::Blocked(reason))
    }

    // ------------------------------------------------------------------------
    // Rewards
    // ------------------------------------------------------------------------

    pub async fn rewards(&self) -> RewardsResponse {
        let controls = self.controls.lock().await;
        rewards_response(&controls)
    }

    pub async fn redeem(&self, name: &str, now: DateTime<Local>) -> ServiceResult<RedeemResponse> {
        let (redemption, points) = {
            let mut controls = self.controls.lock().await;
            let redemption = controls.redeem_reward(name, now)?;
            (redemption, controls.rewards_state().points)
        };

        info!("Reward '{}' redeemed, {:.1} points left", redemption.name, points);
        self.publish(Event::RewardRedeemed {
            name: redemption.name.clone(),
            points_remaining: points,
            timestamp: Utc::now(),
        });
        Ok(RedeemResponse { redemption, points })
    }

    pub async fn adjust_points(&self, delta: f64) -> PointsResponse {
        let points = self.controls.lock().await.adjust_points(delta);
        info!("Points adjusted by {:+.1}, now {:.1}", delta, points);
        PointsResponse { points }
    }

    pub async fn reset_rewards(&self) -> RewardsResponse {
        let mut controls = self.controls.lock().await;
        controls.reset_rewards();
        rewards_response(&controls)
    }

    pub async fn update_rewards_settings(&self, settings: RewardsSettings) -> RewardsResponse {
        let response = {
            let mut controls = self.controls.lock().await;
            controls.update_rewards_settings(settings);
            rewards_response(&controls)
        };
        self.publish(Event::config_updated("rewards"));
        response
    }

    // ------------------------------------------------------------------------
    // Admin authentication
    // ------------------------------------------------------------------------

    pub async fn admin_configured(&self) -> bool {
        self.auth.lock().await.is_configured()
    }

    pub async fn setup_admin(&self, password: SecretString) -> ServiceResult<LoginResponse> {
        let (hash, session) = {
            let mut auth = self.auth.lock().await;
            let hash = auth.setup(&password)?;
            (hash, auth.login(&password)?)
        };
        self.persist_password_hash(hash).await?;
        Ok(login_response(&session))
    }

    pub async fn login(&self, password: SecretString) -> ServiceResult<LoginResponse> {
        let session = self.auth.lock().await.login(&password)?;
        Ok(login_response(&session))
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.auth.lock().await.logout(token)
    }

    pub async fn authorize(&self, token: Option<&str>) -> ServiceResult<()> {
        match token {
            Some(token) if self.auth.lock().await.validate(token) => Ok(()),
            _ => Err(ServiceError::Unauthorized),
        }
    }

    pub async fn change_password(
        &self,
        current: SecretString,
        new_password: SecretString,
    ) -> ServiceResult<()> {
        let hash = self.auth.lock().await.change_password(&current, &new_password)?;
        self.persist_password_hash(hash).await
    }

    async fn persist_password_hash(&self, hash: String) -> ServiceResult<()> {
        let mut config = self.config.write().await;
        config.auth.admin_password_hash = Some(hash);
        config.save_to_path(&self.config_path)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Parental settings and usage
    // ------------------------------------------------------------------------

    pub async fn parental_config(&self) -> ParentalConfig {
        self.controls.lock().await.parental_config().clone()
    }

    pub async fn update_parental_config(
        &self,
        config: ParentalConfig,
    ) -> ServiceResult<ParentalConfig> {
        let max_volume = config.limits.max_volume;
        self.controls.lock().await.update_parental_config(config.clone())?;
        self.publish(Event::config_updated("parental"));

        // Bring a louder player down to the new cap right away
        let current = self.current_playback().await.and_then(|p| p.volume_percent);
        if matches!(current, Some(v) if v > max_volume) {
            if let Err(e) = self.music.set_volume(max_volume).await {
                warn!("Failed to apply new volume cap: {}", e);
            }
        }
        Ok(config)
    }

    pub async fn schedule_config(&self) -> ScheduleConfig {
        self.controls.lock().await.schedule_config().clone()
    }

    pub async fn update_schedule(&self, config: ScheduleConfig) -> ServiceResult<ScheduleConfig> {
        self.controls.lock().await.update_schedule(config.clone())?;
        self.publish(Event::config_updated("schedule"));
        Ok(config)
    }

    pub async fn usage_report(&self, now: DateTime<Local>) -> UsageReport {
        self.controls.lock().await.usage_report(now)
    }

    pub async fn reset_usage(&self, now: DateTime<Local>) -> UsageReport {
        let mut controls = self.controls.lock().await;
        controls.reset_usage(now);
        info!("Today's usage reset by admin");
        controls.usage_report(now)
    }

    // ------------------------------------------------------------------------
    // Spotify setup
    // ------------------------------------------------------------------------

    pub async fn spotify_status(&self) -> SpotifyStatus {
        let config = self.config.read().await;
        SpotifyStatus {
            configured: config.spotify.is_configured(),
            authorized: self.music.is_authorized().await,
            client_id: config.spotify.client_id.clone(),
            redirect_uri: config.spotify.redirect_uri.clone(),
        }
    }

    pub async fn configure_spotify(
        &self,
        credentials: SpotifyCredentials,
    ) -> ServiceResult<SpotifyStatus> {
        let client_id = credentials.client_id.trim().to_string();
        let client_secret = credentials.client_secret.trim().to_string();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(ServiceError::bad_request("Client ID and secret are required"));
        }

        let redirect_uri = {
            let mut config = self.config.write().await;
            if let Some(uri) = credentials.redirect_uri.filter(|u| !u.trim().is_empty()) {
                url::Url::parse(uri.trim()).map_err(ServiceError::bad_request)?;
                config.spotify.redirect_uri = uri.trim().to_string();
            }
            config.spotify.client_id = Some(client_id.clone());
            config.spotify.client_secret = Some(client_secret.clone());
            config.save_to_path(&self.config_path)?;
            config.spotify.redirect_uri.clone()
        };

        self.music.configure(client_id, client_secret, redirect_uri).await;
        self.publish(Event::config_updated("spotify"));
        Ok(self.spotify_status().await)
    }

    /// Authorization URL with a fresh anti-forgery state
    pub async fn spotify_authorize_url(&self) -> ServiceResult<AuthorizeUrlResponse> {
        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(OAUTH_STATE_LENGTH)
            .map(char::from)
            .collect();

        let url = self.music.authorize_url(&state).await?;
        *self.oauth_state.lock().await = Some(state);
        Ok(AuthorizeUrlResponse { url })
    }

    pub async fn complete_spotify_authorization(&self, query: CallbackQuery) -> ServiceResult<()> {
        if let Some(error) = query.error {
            return Err(ServiceError::bad_request(format!(
                "Spotify authorization was denied: {}",
                error
            )));
        }

        let expected = self.oauth_state.lock().await.take();
        if expected.is_none() || expected != query.state {
            warn!("OAuth callback with unexpected state");
            return Err(ServiceError::bad_request("Invalid or expired authorization state"));
        }

        let code = query
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::bad_request("Missing authorization code"))?;
        self.music.exchange_code(&code).await?;
        Ok(())
    }

    pub async fn spotify_devices(&self) -> ServiceResult<Vec<SpotifyDevice>> {
        Ok(self.music.devices().await?)
    }

    pub async fn transfer_playback(&self, device_id: &str) -> ServiceResult<()> {
        if device_id.trim().is_empty() {
            return Err(ServiceError::bad_request("Device ID must not be empty"));
        }
        self.music.transfer_playback(device_id.trim()).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Bluetooth and system
    // ------------------------------------------------------------------------

    pub async fn bluetooth_devices(&self) -> ServiceResult<BluetoothDevicesResponse> {
        let devices = self.system.bluetooth().list_devices().await?;
        Ok(BluetoothDevicesResponse { devices })
    }

    pub async fn bluetooth_scan(
        &self,
        secs: Option<u64>,
    ) -> ServiceResult<BluetoothDevicesResponse> {
        let devices = self.system.bluetooth().scan(secs.unwrap_or(DEFAULT_SCAN_SECS)).await?;
        Ok(BluetoothDevicesResponse { devices })
    }

    pub async fn bluetooth_pair(&self, address: &str) -> ServiceResult<()> {
        validate_address(address).map_err(ServiceError::bad_request)?;
        self.system.bluetooth().pair(address).await?;
        Ok(())
    }

    pub async fn bluetooth_connect(&self, address: &str) -> ServiceResult<()> {
        validate_address(address).map_err(ServiceError::bad_request)?;
        self.system.bluetooth().connect(address).await?;
        Ok(())
    }

    pub async fn bluetooth_disconnect(&self, address: &str) -> ServiceResult<()> {
        validate_address(address).map_err(ServiceError::bad_request)?;
        self.system.bluetooth().disconnect(address).await?;
        Ok(())
    }

    pub async fn bluetooth_remove(&self, address: &str) -> ServiceResult<()> {
        validate_address(address).map_err(ServiceError::bad_request)?;
        self.system.bluetooth().remove(address).await?;
        Ok(())
    }

    pub async fn repair(&self, command: RepairCommand) -> ServiceResult<CommandReport> {
        Ok(self.system.repair(command).await?)
    }

    pub async fn update_system(&self) -> ServiceResult<CommandReport> {
        Ok(self.system.update_system().await?)
    }

    pub async fn set_internet_lockdown(&self, enabled: bool) -> ServiceResult<CommandReport> {
        Ok(self.system.set_internet_lockdown(enabled).await?)
    }

    /// Validate, remember in daemon.toml, write spotifyd.conf and restart it
    pub async fn write_player_config(
        &self,
        request: PlayerConfigRequest,
    ) -> ServiceResult<CommandReport> {
        render_spotifyd_config(&request).map_err(ServiceError::bad_request)?;

        {
            let mut config = self.config.write().await;
            config.player.device_name = request.device_name.trim().to_string();
            config.player.bitrate = request.bitrate;
            config.save_to_path(&self.config_path)?;
        }

        let report = self.system.write_player_config(&request).await?;
        self.publish(Event::config_updated("player"));
        Ok(report)
    }
}

fn session_ended(summary: &SessionSummary) -> Event {
    Event::SessionEnded {
        session_id: summary.session_id,
        duration_minutes: summary.duration_minutes,
        songs_played: summary.songs_played,
        skips: summary.skips,
        timestamp: Utc::now(),
    }
}

fn rewards_response(controls: &ParentalControls) -> RewardsResponse {
    let state = controls.rewards_state();
    RewardsResponse {
        enabled: state.enabled,
        points: state.points,
        rewards_available: state.rewards_available.clone(),
        redeemed_today: state.redeemed_today.clone(),
        points_per_minute: state.points_per_minute,
        daily_login_bonus: state.daily_login_bonus,
        no_skip_bonus: state.no_skip_bonus,
    }
}

fn login_response(session: &SessionToken) -> LoginResponse {
    LoginResponse { token: session.token().to_string(), expires_at: session.expires_at() }
}
