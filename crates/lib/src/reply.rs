//! What the agent hands to a channel: plain text, or a summary plus places to render.

use crate::poi::PoiRecord;

/// Text sent when an inbound message could not be answered (upstream failure or timeout).
pub const UNAVAILABLE_TEXT: &str = "旅遊小幫手暫時無法回應，請稍後再試。";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text only (the not-found path).
    Text(String),
    /// Narrative summary accompanying the places that were found.
    Places {
        summary: String,
        places: Vec<PoiRecord>,
    },
    /// Generic apology after a failed turn.
    Unavailable,
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Text(text) => text,
            Reply::Places { summary, .. } => summary,
            Reply::Unavailable => UNAVAILABLE_TEXT,
        }
    }

    pub fn places(&self) -> &[PoiRecord] {
        match self {
            Reply::Places { places, .. } => places,
            _ => &[],
        }
    }
}
