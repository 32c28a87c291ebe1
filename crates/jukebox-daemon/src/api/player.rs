use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Local;
use jukebox_common::PlaybackSnapshot;
use jukebox_proto::api::{
    PlayTrackRequest, SearchQuery, SearchResponse, StatusResponse, VolumeRequest, VolumeResponse,
};
use tracing::info;

use super::{done, ok, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/current", get(current))
        .route("/play", post(play))
        .route("/pause", post(pause))
        .route("/next", post(next))
        .route("/previous", post(previous))
        .route("/volume", post(volume))
        .route("/track", post(play_track))
        .route("/search", get(search))
}

pub async fn status(State(service): State<AppState>) -> ApiResult<StatusResponse> {
    ok(service.status(Local::now()).await)
}

/// Last polled snapshot, never a live Spotify call
pub async fn current(State(service): State<AppState>) -> ApiResult<Option<PlaybackSnapshot>> {
    ok(service.current_playback().await)
}

pub async fn play(State(service): State<AppState>) -> ApiResult<()> {
    info!("POST /api/player/play");
    service.play(Local::now()).await?;
    done()
}

pub async fn pause(State(service): State<AppState>) -> ApiResult<()> {
    info!("POST /api/player/pause");
    service.pause().await?;
    done()
}

pub async fn next(State(service): State<AppState>) -> ApiResult<()> {
    info!("POST /api/player/next");
    service.next(Local::now()).await?;
    done()
}

pub async fn previous(State(service): State<AppState>) -> ApiResult<()> {
    info!("POST /api/player/previous");
    service.previous().await?;
    done()
}

pub async fn volume(
    State(service): State<AppState>,
    Json(request): Json<VolumeRequest>,
) -> ApiResult<VolumeResponse> {
    info!("POST /api/player/volume - {}", request.volume_percent);
    ok(service.set_volume(request.volume_percent).await?)
}

pub async fn play_track(
    State(service): State<AppState>,
    Json(request): Json<PlayTrackRequest>,
) -> ApiResult<()> {
    info!("POST /api/player/track - {}", request.uri);
    service.play_track(&request.uri, Local::now()).await?;
    done()
}

pub async fn search(
    State(service): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    info!("GET /api/player/search - q: {:?}", query.q);
    ok(service.search(&query.q, query.limit).await?)
}
