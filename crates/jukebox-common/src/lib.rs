pub mod config;
pub mod content_filter;
pub mod controls;
pub mod error;
pub mod rewards;
pub mod schedule;
pub mod security;
pub mod store;
pub mod types;
pub mod usage;

pub use content_filter::{ContentFilter, FilterDecision};
pub use controls::{FavoriteSong, ListeningDecision, ParentalControls, UsageReport};
pub use error::{Error, Result};
pub use rewards::{RewardsLedger, RewardsSettings};
pub use schedule::{AccessResult, ScheduleGate};
pub use security::{PasswordManager, RateLimiter, SessionToken};
pub use store::JsonStore;
pub use types::*;
pub use usage::{SessionSummary, TimeLimitCheck, UsageTracker};
