//! Messaging platform adapter (Discord).

pub mod discord;
pub mod traits;

pub use discord::{DiscordHandler, DiscordResponder};
pub use traits::Responder;
