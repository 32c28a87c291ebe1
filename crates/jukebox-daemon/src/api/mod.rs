//! REST and WebSocket interface
//!
//! Every JSON endpoint answers with the `{success, data?, error?}` envelope.
//! Routes under `/api/admin` require a bearer token from `/api/auth/login`.

use std::sync::Arc;

use axum::{
    middleware,
    response::Json,
    routing::get,
    Router,
};
use jukebox_proto::ApiResponse;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::error::ServiceError;
use crate::service::KioskService;

pub mod admin;
pub mod auth;
pub mod error;
pub mod player;
pub mod rewards;
pub mod system;
pub mod ws;

pub type AppState = Arc<KioskService>;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

pub fn done() -> ApiResult<()> {
    Ok(Json(ApiResponse::empty()))
}

/// Build the full application router
pub fn router(service: AppState, static_dir: Option<&str>) -> Router {
    let admin_routes = admin::router()
        .merge(system::router())
        .route_layer(middleware::from_fn_with_state(service.clone(), auth::require_admin));

    let api = Router::new()
        .route("/status", get(player::status))
        .nest("/player", player::router())
        .nest("/rewards", rewards::router())
        .nest("/auth", auth::router())
        .nest("/admin", admin_routes);

    let app = Router::new()
        .nest("/api", api)
        .route("/callback", get(admin::spotify_callback))
        .route("/ws", get(ws::handler));

    let app = match static_dir {
        Some(dir) => {
            info!("Serving static files from {}", dir);
            app.fallback_service(ServeDir::new(dir))
        }
        None => app,
    };

    app.layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(service)
}
