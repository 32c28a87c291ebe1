use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Local;
use jukebox_common::{ParentalConfig, RewardsSettings, ScheduleConfig, UsageReport};
use jukebox_proto::api::{
    AdjustPointsRequest, AuthorizeUrlResponse, CallbackQuery, ChangePasswordRequest,
    PointsResponse, RewardsResponse, SpotifyCredentials, SpotifyDevicesResponse, SpotifyStatus,
    TransferPlaybackRequest,
};
use secrecy::SecretString;
use tracing::{error, info};

use super::{done, ok, ApiResult, AppState};
use crate::error::ServiceError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/parental", get(get_parental).put(put_parental))
        .route("/schedule", get(get_schedule).put(put_schedule))
        .route("/usage", get(usage))
        .route("/usage/reset", post(reset_usage))
        .route("/rewards", put(put_rewards_settings))
        .route("/rewards/adjust", post(adjust_points))
        .route("/rewards/reset", post(reset_rewards))
        .route("/spotify", get(get_spotify).put(put_spotify))
        .route("/spotify/authorize", get(spotify_authorize))
        .route("/spotify/devices", get(spotify_devices))
        .route("/spotify/transfer", post(spotify_transfer))
        .route("/password", post(change_password))
}

pub async fn get_parental(State(service): State<AppState>) -> ApiResult<ParentalConfig> {
    ok(service.parental_config().await)
}

pub async fn put_parental(
    State(service): State<AppState>,
    Json(config): Json<ParentalConfig>,
) -> ApiResult<ParentalConfig> {
    info!("PUT /api/admin/parental");
    ok(service.update_parental_config(config).await?)
}

pub async fn get_schedule(State(service): State<AppState>) -> ApiResult<ScheduleConfig> {
    ok(service.schedule_config().await)
}

pub async fn put_schedule(
    State(service): State<AppState>,
    Json(config): Json<ScheduleConfig>,
) -> ApiResult<ScheduleConfig> {
    info!("PUT /api/admin/schedule - enabled: {}", config.enabled);
    ok(service.update_schedule(config).await?)
}

pub async fn usage(State(service): State<AppState>) -> ApiResult<UsageReport> {
    ok(service.usage_report(Local::now()).await)
}

pub async fn reset_usage(State(service): State<AppState>) -> ApiResult<UsageReport> {
    info!("POST /api/admin/usage/reset");
    ok(service.reset_usage(Local::now()).await)
}

pub async fn put_rewards_settings(
    State(service): State<AppState>,
    Json(settings): Json<RewardsSettings>,
) -> ApiResult<RewardsResponse> {
    info!("PUT /api/admin/rewards - enabled: {}", settings.enabled);
    ok(service.update_rewards_settings(settings).await)
}

pub async fn adjust_points(
    State(service): State<AppState>,
    Json(request): Json<AdjustPointsRequest>,
) -> ApiResult<PointsResponse> {
    info!("POST /api/admin/rewards/adjust - {:+}", request.delta);
    if !request.delta.is_finite() {
        return Err(ServiceError::bad_request("delta must be a finite number"));
    }
    ok(service.adjust_points(request.delta).await)
}

pub async fn reset_rewards(State(service): State<AppState>) -> ApiResult<RewardsResponse> {
    info!("POST /api/admin/rewards/reset");
    ok(service.reset_rewards().await)
}

pub async fn get_spotify(State(service): State<AppState>) -> ApiResult<SpotifyStatus> {
    ok(service.spotify_status().await)
}

pub async fn put_spotify(
    State(service): State<AppState>,
    Json(credentials): Json<SpotifyCredentials>,
) -> ApiResult<SpotifyStatus> {
    info!("PUT /api/admin/spotify - client_id: {}", credentials.client_id);
    ok(service.configure_spotify(credentials).await?)
}

pub async fn spotify_authorize(
    State(service): State<AppState>,
) -> ApiResult<AuthorizeUrlResponse> {
    info!("GET /api/admin/spotify/authorize");
    ok(service.spotify_authorize_url().await?)
}

pub async fn spotify_devices(
    State(service): State<AppState>,
) -> ApiResult<SpotifyDevicesResponse> {
    let devices = service.spotify_devices().await?;
    ok(SpotifyDevicesResponse { devices })
}

pub async fn spotify_transfer(
    State(service): State<AppState>,
    Json(request): Json<TransferPlaybackRequest>,
) -> ApiResult<()> {
    info!("POST /api/admin/spotify/transfer - {}", request.device_id);
    service.transfer_playback(&request.device_id).await?;
    done()
}

/// OAuth redirect target. Opened in the parent's browser, so it answers
/// with plain text instead of the JSON envelope.
pub async fn spotify_callback(
    State(service): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    info!("GET /callback");
    match service.complete_spotify_authorization(query).await {
        Ok(()) => {
            (StatusCode::OK, "Spotify is connected. You can close this window.").into_response()
        }
        Err(e) => {
            error!("Spotify authorization failed: {}", e);
            (e.status_code(), format!("Spotify authorization failed: {}", e)).into_response()
        }
    }
}

pub async fn change_password(
    State(service): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    info!("POST /api/admin/password");
    service
        .change_password(
            SecretString::from(request.current_password),
            SecretString::from(request.new_password),
        )
        .await?;
    done()
}
