//! Point-of-interest search: records, decoding and the remote keyword search client.

mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::PoiClient;

/// Body of a search that found nothing; also what an empty keyword "returns".
pub const EMPTY_PAYLOAD: &str = r#"{"pois":[]}"#;

/// One point of interest as returned by the search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoiRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, rename = "nickname", deserialize_with = "null_as_default")]
    pub nicknames: Vec<String>,
    #[serde(
        default,
        rename = "coverPhoto",
        deserialize_with = "non_empty_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_photo_url: Option<String>,
    #[serde(rename = "poiURL")]
    pub detail_url: String,
}

impl PoiRecord {
    /// First nickname, or `default` when the record has none.
    pub fn nickname_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.nicknames
            .iter()
            .map(|n| n.trim())
            .find(|n| !n.is_empty())
            .unwrap_or(default)
    }

    /// First nickname, falling back to the record's name.
    pub fn display_nickname(&self) -> &str {
        self.nickname_or(&self.name)
    }
}

/// `null` decodes like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Records of one search plus the raw JSON payload they were decoded from, which the
/// summarization turn replays to the model verbatim. Empty `records` means "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoiSearchResult {
    pub records: Vec<PoiRecord>,
    pub payload: String,
}

impl PoiSearchResult {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            payload: EMPTY_PAYLOAD.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    pois: Option<Vec<PoiRecord>>,
}

/// Decode a search response body. A `null` or missing `pois` list is an empty result.
pub fn decode_pois(body: &[u8]) -> Result<PoiSearchResult, PoiError> {
    let response: SearchResponse =
        serde_json::from_slice(body).map_err(|e| PoiError::Decode(e.to_string()))?;
    Ok(PoiSearchResult {
        records: response.pois.unwrap_or_default(),
        payload: String::from_utf8_lossy(body).into_owned(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PoiError {
    #[error("poi request could not be encoded: {0}")]
    Marshal(#[source] serde_json::Error),
    #[error("poi request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("poi request timed out")]
    Timeout,
    #[error("poi api error: {status} {body}")]
    Status { status: u16, body: String },
    #[error("reading poi response failed: {0}")]
    BodyRead(#[source] reqwest::Error),
    #[error("malformed poi response: {0}")]
    Decode(String),
}

/// Keyword search over the POI service. An empty keyword is legal and yields an empty
/// result without a remote call.
#[async_trait]
pub trait PoiSearch: Send + Sync {
    async fn search(&self, keyword: &str) -> Result<PoiSearchResult, PoiError>;
}
