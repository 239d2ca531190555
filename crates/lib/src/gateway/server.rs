//! Gateway HTTP server: health probe and the LINE webhook.
//!
//! Events of one webhook request are handled one after another inside that request's
//! handler; separate requests run concurrently. When LINE drops the connection the handler
//! future is dropped, which cancels any completion or search call still in flight.

use crate::agent::Agent;
use crate::channels::line::SIGNATURE_HEADER;
use crate::channels::{InboundMessage, LineChannel, ReplyChannel, WebhookBody};
use crate::config::{self, Config};
use crate::routing;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared, read-only state for request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub agent: Agent,
    pub line: Arc<LineChannel>,
}

impl GatewayState {
    pub fn new(config: Config, agent: Agent, line: LineChannel) -> Self {
        Self {
            config: Arc::new(config),
            agent,
            line: Arc::new(line),
        }
    }

    /// Clients and agent built from the loaded config.
    pub fn from_config(config: Config) -> Result<Self> {
        let agent = Agent::from_config(&config).context("building agent")?;
        let line = LineChannel::from_config(&config).context("building line channel")?;
        Ok(Self::new(config, agent, line))
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/callback", post(line_webhook))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind and the resolved port.
/// Blocks until shutdown (Ctrl+C or SIGTERM).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind_addr = format!(
        "{}:{}",
        config.gateway.bind.trim(),
        config::resolve_gateway_port(&config)
    );
    let state = GatewayState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// Route one inbound message, run the agent and send its reply. Failures end here.
async fn process_inbound_message(state: &GatewayState, msg: InboundMessage) {
    let Some(text) = routing::route(&msg, &state.config.bot) else {
        return;
    };
    log::info!(
        "inbound: message from {} ({})",
        msg.user_id.as_deref().unwrap_or("unknown"),
        if msg.is_group() { "group" } else { "direct" }
    );
    let reply = state.agent.respond(&text).await;
    if state.line.reply(&msg.reply_token, &reply).await.is_err() {
        log::warn!("inbound: reply was not delivered");
    }
}

/// POST /callback: LINE webhook. Verifies X-Line-Signature, then answers each text event.
async fn line_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if !state.line.verify(&body, signature) {
        log::warn!("webhook: invalid signature");
        return StatusCode::BAD_REQUEST;
    }
    let payload: WebhookBody = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("webhook: unparsable body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    for event in &payload.events {
        if let Some(msg) = event.to_inbound() {
            process_inbound_message(&state, msg).await;
        }
    }
    StatusCode::OK
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": config::resolve_gateway_port(&state.config),
    }))
}
