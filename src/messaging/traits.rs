//! Outbound messaging trait.

use crate::InboundMessage;
use crate::error::Result;

use std::future::Future;

/// Sends text back to wherever an inbound message came from.
pub trait Responder: Send + Sync + 'static {
    /// Post `text` to the message's channel.
    fn respond(
        &self,
        message: &InboundMessage,
        text: String,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Show a typing indicator while a reply is generated.
    fn send_typing(&self, message: &InboundMessage) -> impl Future<Output = Result<()>> + Send {
        let _ = message;
        async { Ok(()) }
    }
}
