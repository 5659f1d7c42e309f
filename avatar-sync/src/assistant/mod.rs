//! Assistant backend
//!
//! HTTP client for the chat endpoints and the controller that routes chat
//! progress and failures to the avatars.

mod chat;
mod client;
pub mod models;

pub use chat::ChatController;
pub use chat::ChatOutcome;
pub use client::AssistantClient;
pub use client::AssistantClientBuilder;
pub use client::Missing;
pub use client::Set;
pub use client::Timeouts;
