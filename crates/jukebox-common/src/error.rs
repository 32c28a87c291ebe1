use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reward not found: {0}")]
    RewardNotFound(String),

    #[error("Not enough points: {required} required, {available:.0} available")]
    InsufficientPoints { required: u32, available: f64 },

    #[error("Rewards are disabled")]
    RewardsDisabled,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

impl From<argon2::password_hash::Error> for Error {
    fn from(e: argon2::password_hash::Error) -> Self {
        Error::PasswordHash(e.to_string())
    }
}
