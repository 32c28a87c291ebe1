use thiserror::Error;

use crate::spotify::SpotifyError;

/// Failures surfaced by `KioskService`; the REST layer maps each variant to an
/// HTTP status.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Admin authentication required")]
    Unauthorized,

    #[error("Invalid password")]
    InvalidCredentials,

    #[error("Too many failed login attempts, try again later")]
    RateLimited,

    #[error("{0}")]
    NotFound(String),

    /// Playback refused by the schedule, a time limit or the skip cap
    #[error("{0}")]
    Blocked(String),

    #[error(transparent)]
    Spotify(#[from] SpotifyError),

    #[error(transparent)]
    Controls(#[from] jukebox_common::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn bad_request(message: impl std::fmt::Display) -> Self {
        ServiceError::BadRequest(message.to_string())
    }
}
