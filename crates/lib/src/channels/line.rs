//! LINE channel: webhook payloads, X-Line-Signature verification and the reply API.
//! Places are rendered as a flex carousel of micro bubbles.

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;

use super::{ChannelError, InboundMessage, ReplyChannel};
use crate::config::{self, Config};
use crate::poi::PoiRecord;
use crate::reply::Reply;

pub const SIGNATURE_HEADER: &str = "X-Line-Signature";
pub const ALT_TEXT_PLACES: &str = "旅遊小幫手幫你推薦的景點";
pub const IMAGE_NOT_FOUND: &str =
    "https://www.salonlfc.com/wp-content/uploads/2018/01/image-not-found-scaled-1150x647.png";
const BUTTON_LABEL: &str = "帶我去";
/// LINE rejects carousels with more bubbles than this.
const MAX_BUBBLES: usize = 12;
const MAX_TEXT_CHARS: usize = 5000;
const REPLY_TIMEOUT_SECS: u64 = 10;

type HmacSha256 = Hmac<Sha256>;

/// Webhook request body.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type", default)]
    pub typ: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookEvent {
    /// Text message events become inbound messages; everything else is ignored.
    pub fn to_inbound(&self) -> Option<InboundMessage> {
        if self.typ != "message" {
            return None;
        }
        let message = self.message.as_ref().filter(|m| m.typ == "text")?;
        let text = message.text.clone()?;
        let reply_token = self.reply_token.clone()?;
        let source = self.source.as_ref();
        let group_id = source.and_then(|s| {
            s.group_id
                .clone()
                .or_else(|| s.room_id.clone())
                .filter(|id| !id.is_empty())
        });
        Some(InboundMessage {
            reply_token,
            text,
            user_id: source.and_then(|s| s.user_id.clone()),
            group_id,
        })
    }
}

/// base64(HMAC-SHA256(channel secret, body)), the value LINE puts in X-Line-Signature.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Outbound message object of the Messaging API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LineMessage {
    Text {
        text: String,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: serde_json::Value,
    },
}

impl LineMessage {
    fn text(text: &str) -> Self {
        LineMessage::Text {
            text: text.chars().take(MAX_TEXT_CHARS).collect(),
        }
    }
}

/// Micro bubble: cover photo, name, nickname (or the name again) and a link button.
pub fn poi_bubble(record: &PoiRecord) -> serde_json::Value {
    let cover = record.cover_photo_url.as_deref().unwrap_or(IMAGE_NOT_FOUND);
    json!({
        "type": "bubble",
        "size": "micro",
        "hero": {
            "type": "image",
            "url": cover,
            "size": "full",
            "aspectRatio": "1:1",
            "aspectMode": "cover"
        },
        "body": {
            "type": "box",
            "layout": "vertical",
            "contents": [
                { "type": "text", "text": record.name, "weight": "bold", "size": "sm", "wrap": true },
                { "type": "text", "text": record.display_nickname(), "weight": "bold", "size": "sm", "wrap": true },
                {
                    "type": "button",
                    "action": { "type": "uri", "label": BUTTON_LABEL, "uri": record.detail_url }
                }
            ]
        }
    })
}

pub fn poi_carousel(records: &[PoiRecord]) -> serde_json::Value {
    let bubbles: Vec<serde_json::Value> = records.iter().take(MAX_BUBBLES).map(poi_bubble).collect();
    json!({ "type": "carousel", "contents": bubbles })
}

/// Messages for one reply, in send order: the carousel first, then the text.
pub fn render(reply: &Reply) -> Vec<LineMessage> {
    match reply {
        Reply::Places { summary, places } if !places.is_empty() => vec![
            LineMessage::Flex {
                alt_text: ALT_TEXT_PLACES.to_string(),
                contents: poi_carousel(places),
            },
            LineMessage::text(summary),
        ],
        other => vec![LineMessage::text(other.text())],
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [LineMessage],
}

/// LINE Messaging API connector for replies and webhook verification.
pub struct LineChannel {
    api_base: String,
    access_token: Option<String>,
    channel_secret: Option<String>,
    client: reqwest::Client,
}

impl LineChannel {
    pub fn new(
        api_base: String,
        access_token: Option<String>,
        channel_secret: Option<String>,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REPLY_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token,
            channel_secret,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ChannelError> {
        let access_token = config::resolve_line_access_token(config);
        let channel_secret = config::resolve_line_channel_secret(config);
        if access_token.is_none() {
            log::warn!("line: channel access token not configured, replies will fail");
        }
        if channel_secret.is_none() {
            log::warn!("line: channel secret not configured, webhook signatures are not checked");
        }
        Self::new(config::resolve_line_api_base(config), access_token, channel_secret)
    }

    /// True when the body was signed with the channel secret, or no secret is configured.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> bool {
        match self.channel_secret {
            Some(ref secret) => signature
                .map(|s| verify_signature(secret, body, s))
                .unwrap_or(false),
            None => true,
        }
    }

    /// POST /v2/bot/message/reply.
    pub async fn send_reply(
        &self,
        reply_token: &str,
        messages: &[LineMessage],
    ) -> Result<(), ChannelError> {
        let token = self.access_token.as_ref().ok_or(ChannelError::MissingToken)?;
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = ReplyRequest {
            reply_token,
            messages,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ReplyChannel for LineChannel {
    async fn reply(&self, reply_token: &str, reply: &Reply) -> Result<(), ChannelError> {
        let messages = render(reply);
        let result = self.send_reply(reply_token, &messages).await;
        if let Err(ref e) = result {
            log::warn!("line: reply failed: {}", e);
            match serde_json::to_string(&messages) {
                Ok(out) => log::debug!("line: rejected payload: {}", out),
                Err(e) => log::debug!("line: payload not serializable: {}", e),
            }
        }
        result
    }
}
