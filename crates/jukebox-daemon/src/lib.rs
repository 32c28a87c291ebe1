pub mod api;
pub mod auth;
pub mod bluetooth;
pub mod command;
pub mod config;
pub mod daemon;
pub mod enforcement_task;
pub mod error;
pub mod poller;
pub mod service;
pub mod spotify;
pub mod system_control;

pub use error::{ServiceError, ServiceResult};
pub use service::KioskService;
pub use spotify::{MusicService, SpotifyClient, SpotifyError};
