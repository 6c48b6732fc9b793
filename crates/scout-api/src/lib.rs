// scout-api: Async Rust client for the Scout Alarm cloud API (REST + push channel)

pub mod client;
pub mod error;
pub mod location;
pub mod models;
pub mod push;
pub mod session;

pub use client::RestClient;
pub use error::Error;
pub use location::LocationClient;
pub use push::Listener;
pub use session::Session;
