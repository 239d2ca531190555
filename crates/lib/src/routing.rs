//! Inbound routing: decide whether a chat message goes to the agent and with which text.
//!
//! Direct chats are always answered. Group and room chats are answered only when they
//! contain the configured trigger (e.g. ":gpt"), unless `bot.requireGroupTrigger` is off.

use crate::channels::InboundMessage;
use crate::config::BotConfig;

/// Text to hand to the agent, or `None` when the message is not for the bot.
pub fn route(msg: &InboundMessage, bot: &BotConfig) -> Option<String> {
    route_text(&msg.text, msg.is_group(), bot)
}

pub fn route_text(text: &str, is_group: bool, bot: &BotConfig) -> Option<String> {
    let trigger = bot.group_trigger.trim();
    let has_trigger = !trigger.is_empty() && text.contains(trigger);
    if is_group && bot.require_group_trigger && !trigger.is_empty() && !has_trigger {
        log::debug!("routing: group message without trigger ignored");
        return None;
    }
    let text = if has_trigger {
        text.replacen(trigger, "", 1)
    } else {
        text.to_string()
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
