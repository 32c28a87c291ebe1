use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use jukebox_proto::ApiResponse;
use tracing::{debug, error};

use crate::error::ServiceError;
use crate::spotify::SpotifyError;

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        use jukebox_common::Error as ControlsError;

        match self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized | ServiceError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Blocked(_) => StatusCode::FORBIDDEN,
            ServiceError::Spotify(e) => match e {
                SpotifyError::NotConfigured | SpotifyError::NotAuthorized => {
                    StatusCode::BAD_REQUEST
                }
                SpotifyError::NoActiveDevice
                | SpotifyError::Api { .. }
                | SpotifyError::Http(_)
                | SpotifyError::Url(_) => StatusCode::BAD_GATEWAY,
            },
            ServiceError::Controls(e) => match e {
                ControlsError::RewardNotFound(_) => StatusCode::NOT_FOUND,
                ControlsError::InvalidTime(_)
                | ControlsError::InvalidConfig(_)
                | ControlsError::InsufficientPoints { .. }
                | ControlsError::RewardsDisabled => StatusCode::BAD_REQUEST,
                ControlsError::Io(_)
                | ControlsError::Serialization(_)
                | ControlsError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {:#}", self);
        } else {
            debug!("Request rejected ({}): {}", status, self);
        }

        (status, Json(ApiResponse::<()>::err(self.to_string()))).into_response()
    }
}
