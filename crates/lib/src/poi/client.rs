//! HTTP client for the POI keyword search endpoint (`POST {"keyword": ..}`).

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{decode_pois, PoiError, PoiSearch, PoiSearchResult};
use crate::config::PoiConfig;

#[derive(Clone)]
pub struct PoiClient {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    keyword: &'a str,
}

impl PoiClient {
    /// Every request is bounded by `poi.timeout_secs`.
    pub fn new(poi: &PoiConfig) -> Result<Self, PoiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poi.timeout_secs))
            .build()
            .map_err(PoiError::Transport)?;
        Ok(Self {
            url: poi.url.trim().to_string(),
            client,
        })
    }
}

fn transport_error(e: reqwest::Error) -> PoiError {
    if e.is_timeout() {
        PoiError::Timeout
    } else {
        PoiError::Transport(e)
    }
}

#[async_trait]
impl PoiSearch for PoiClient {
    async fn search(&self, keyword: &str) -> Result<PoiSearchResult, PoiError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            log::debug!("poi: empty keyword, skipping search");
            return Ok(PoiSearchResult::empty());
        }
        let payload =
            serde_json::to_vec(&SearchRequest { keyword }).map_err(PoiError::Marshal)?;
        log::debug!("poi: POST {} keyword={}", self.url, keyword);
        let res = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(transport_error)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|e| {
            if e.is_timeout() {
                PoiError::Timeout
            } else {
                PoiError::BodyRead(e)
            }
        })?;
        if !status.is_success() {
            return Err(PoiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let result = decode_pois(&bytes)?;
        log::debug!("poi: {} record(s) for {}", result.records.len(), keyword);
        Ok(result)
    }
}
