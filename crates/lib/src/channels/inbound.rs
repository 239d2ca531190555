//! Inbound message from a channel: delivered to the gateway for routing and an agent turn.

/// A text message from a chat, with what is needed to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Single-use token for the reply API.
    pub reply_token: String,
    pub text: String,
    pub user_id: Option<String>,
    /// Group or room id; `None` for one-to-one chats.
    pub group_id: Option<String>,
}

impl InboundMessage {
    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }
}
