//! Conversation history and text normalization.

pub mod history;
pub mod sanitize;

pub use history::{History, InteractionRecord};
pub use sanitize::sanitize;
