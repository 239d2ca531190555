//! Configuration types and loading.
//!
//! Config is loaded once at start-up from a JSON file (e.g. `~/.tripbot/config.json`) and
//! environment. It is read-only afterwards and handed by reference to the client constructors.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_POI_URL: &str = "https://nextjs-chatgpt-plugin-starter.vercel.app/api/get-poi";
pub const DEFAULT_LINE_API_BASE: &str = "https://api.line.me";
pub const DEFAULT_GROUP_TRIGGER: &str = ":gpt";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (LINE).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Chat completion endpoint, credentials and model.
    #[serde(default)]
    pub llm: LlmConfig,

    /// POI search endpoint.
    #[serde(default)]
    pub poi: PoiConfig,

    /// Bot behaviour (group trigger policy).
    #[serde(default)]
    pub bot: BotConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the webhook server (default 8080). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; LINE must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Port given on the command line (`serve --port`); wins over PORT env and `port`.
    #[serde(skip)]
    pub port_override: Option<u16>,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            port_override: None,
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub line: LineChannelConfig,
}

/// LINE Messaging API channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChannelConfig {
    /// Channel secret used to verify X-Line-Signature. Overridden by LINE_CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Long-lived channel access token for the reply API. Overridden by LINE_CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    /// Messaging API base URL (default https://api.line.me).
    pub api_base_url: Option<String>,
}

/// Chat completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// OpenAI-compatible base URL; `/chat/completions` is appended.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Bearer token. Overridden by OPENAI_API_KEY env.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Upper bound for one completion call, in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional persona instruction sent as a system message on the keyword extraction turn.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_llm_base_url() -> String {
    DEFAULT_LLM_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
            system_prompt: None,
        }
    }
}

/// POI search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoiConfig {
    /// Full URL of the keyword search endpoint.
    #[serde(default = "default_poi_url")]
    pub url: String,
    /// Upper bound for one search call, in seconds.
    #[serde(default = "default_poi_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poi_url() -> String {
    DEFAULT_POI_URL.to_string()
}

fn default_poi_timeout_secs() -> u64 {
    10
}

impl Default for PoiConfig {
    fn default() -> Self {
        Self {
            url: default_poi_url(),
            timeout_secs: default_poi_timeout_secs(),
        }
    }
}

/// Bot behaviour in group and room chats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// When true, group/room messages are only answered if they contain `group_trigger`.
    /// When false, every group message is answered like a direct message.
    #[serde(default = "default_require_group_trigger")]
    pub require_group_trigger: bool,
    /// Trigger token (default ":gpt"). Stripped from the text before it reaches the agent.
    #[serde(default = "default_group_trigger")]
    pub group_trigger: String,
}

fn default_require_group_trigger() -> bool {
    true
}

fn default_group_trigger() -> String {
    DEFAULT_GROUP_TRIGGER.to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            require_group_trigger: default_require_group_trigger(),
            group_trigger: default_group_trigger(),
        }
    }
}

/// Env value trimmed; empty counts as unset.
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_non_empty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the completion API key: env OPENAI_API_KEY overrides config.
pub fn resolve_llm_api_key(config: &Config) -> Option<String> {
    env_non_empty("OPENAI_API_KEY").or_else(|| config_non_empty(config.llm.api_key.as_ref()))
}

/// Resolve the LINE channel secret: env LINE_CHANNEL_SECRET overrides config.
pub fn resolve_line_channel_secret(config: &Config) -> Option<String> {
    env_non_empty("LINE_CHANNEL_SECRET")
        .or_else(|| config_non_empty(config.channels.line.channel_secret.as_ref()))
}

/// Resolve the LINE channel access token: env LINE_CHANNEL_ACCESS_TOKEN overrides config.
pub fn resolve_line_access_token(config: &Config) -> Option<String> {
    env_non_empty("LINE_CHANNEL_ACCESS_TOKEN")
        .or_else(|| config_non_empty(config.channels.line.channel_access_token.as_ref()))
}

/// LINE Messaging API base URL without trailing slash.
pub fn resolve_line_api_base(config: &Config) -> String {
    config_non_empty(config.channels.line.api_base_url.as_ref())
        .unwrap_or_else(|| DEFAULT_LINE_API_BASE.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Gateway port: the command-line override, then env PORT (e.g. on a PaaS), then config.
pub fn resolve_gateway_port(config: &Config) -> u16 {
    pick_gateway_port(&config.gateway, env_non_empty("PORT").as_deref())
}

fn pick_gateway_port(gateway: &GatewayConfig, env_port: Option<&str>) -> u16 {
    gateway
        .port_override
        .or_else(|| env_port.and_then(|p| p.trim().parse().ok()))
        .unwrap_or(gateway.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TRIPBOT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".tripbot").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    validate(&config).with_context(|| format!("invalid config in {}", path.display()))?;
    Ok((config, path))
}

/// Reject settings no request could succeed with.
fn validate(config: &Config) -> Result<()> {
    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeoutSecs must be at least 1");
    }
    if config.poi.timeout_secs == 0 {
        anyhow::bail!("poi.timeoutSecs must be at least 1");
    }
    Ok(())
}
