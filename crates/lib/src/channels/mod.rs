//! Communication channels (LINE).
//!
//! Webhook payloads are turned into [`InboundMessage`]s for the gateway; replies go back
//! through a [`ReplyChannel`].

mod inbound;
pub mod line;

use async_trait::async_trait;

use crate::reply::Reply;

pub use inbound::InboundMessage;
pub use line::{LineChannel, WebhookBody, WebhookEvent};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel access token not configured")]
    MissingToken,
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel api error: {status} {body}")]
    Api { status: u16, body: String },
}

/// Delivers an agent reply to the chat the inbound message came from.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn reply(&self, reply_token: &str, reply: &Reply) -> Result<(), ChannelError>;
}
