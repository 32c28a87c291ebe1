pub mod api;
pub mod events;

pub use api::ApiResponse;
pub use events::Event;
