use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Local;
use jukebox_proto::api::{RedeemRequest, RedeemResponse, RewardsResponse};
use tracing::info;

use super::{ok, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_rewards)).route("/redeem", post(redeem))
}

pub async fn get_rewards(State(service): State<AppState>) -> ApiResult<RewardsResponse> {
    ok(service.rewards().await)
}

pub async fn redeem(
    State(service): State<AppState>,
    Json(request): Json<RedeemRequest>,
) -> ApiResult<RedeemResponse> {
    info!("POST /api/rewards/redeem - {}", request.name);
    ok(service.redeem(&request.name, Local::now()).await?)
}
