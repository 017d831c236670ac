//! koboldbot: relays Discord chat to a local text-generation server.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod messaging;
pub mod prompts;
pub mod startup;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Message author identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub name: String,
}

/// A guild member, used to resolve mention tokens to display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub name: String,
}

/// Guild a message was posted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildContext {
    pub name: String,
    pub members: Vec<Member>,
}

/// Inbound message from the messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: u64,
    /// Channel replies go back to.
    pub channel_id: u64,
    pub author: Author,
    pub content: String,
    /// None for direct messages.
    pub guild: Option<GuildContext>,
    /// The platform flagged an explicit mention of the bot.
    pub mentions_bot: bool,
}
