use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use jukebox_proto::api::{LoginRequest, LoginResponse};
use secrecy::SecretString;
use tracing::{info, warn};

use super::{done, ok, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/setup", post(setup))
        .route("/logout", post(logout))
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects requests without a live admin session
pub async fn require_admin(
    State(service): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers()).map(str::to_string);
    match service.authorize(token.as_deref()).await {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!("Rejected admin request to {}", request.uri().path());
            e.into_response()
        }
    }
}

pub async fn login(
    State(service): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    info!("POST /api/auth/login");
    ok(service.login(SecretString::from(request.password)).await?)
}

/// First-run password; refused once one is set
pub async fn setup(
    State(service): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    info!("POST /api/auth/setup");
    ok(service.setup_admin(SecretString::from(request.password)).await?)
}

pub async fn logout(State(service): State<AppState>, headers: HeaderMap) -> ApiResult<()> {
    info!("POST /api/auth/logout");
    if let Some(token) = bearer_token(&headers) {
        service.logout(token).await;
    }
    done()
}
