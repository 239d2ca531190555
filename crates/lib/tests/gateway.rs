//! Integration test: the gateway against local stubs of the completion API, the POI service
//! and the LINE reply API. Server tasks are left running when each test ends.

mod common;

use axum::{
    extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router,
};
use common::{
    authorization, completion_function_call, completion_text, serve, taipei_pois, Recorder,
};
use lib::agent::Agent;
use lib::channels::line::{sign, ALT_TEXT_PLACES, SIGNATURE_HEADER};
use lib::channels::LineChannel;
use lib::config::Config;
use lib::gateway::{self, GatewayState};
use lib::llm::OpenAiClient;
use lib::poi::PoiClient;
use lib::reply::UNAVAILABLE_TEXT;
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "test-channel-secret";
const ACCESS_TOKEN: &str = "test-access-token";
const API_KEY: &str = "sk-test";
const SUMMARY: &str = "推薦你去台北101和故宮。";
const REWRITE: &str = "請推薦台灣的旅遊景點";
const FALLBACK: &str = "目前找不到相關景點，建議你可以到日月潭走走。";

#[derive(Clone, Default)]
struct Upstream {
    completions: Recorder,
    searches: Recorder,
    replies: Recorder,
}

/// Completion stub: transcript with a function result → summary, declared function → keyword
/// call ("火星" when the user mentions Mars), anything else → rewrite.
async fn completions(
    State(up): State<Upstream>,
    headers: HeaderMap,
    Json(req): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    up.completions.push(authorization(&headers), req.clone());
    let messages = req["messages"].as_array().cloned().unwrap_or_default();
    if let Some(result) = messages.iter().find(|m| m["role"] == "function") {
        let found = result["content"].as_str().unwrap_or("").contains("台北101");
        return Json(completion_text(if found { SUMMARY } else { FALLBACK }));
    }
    if req.get("functions").is_some() {
        let asked = messages
            .last()
            .and_then(|m| m["content"].as_str())
            .unwrap_or_default();
        let keyword = if asked.contains("火星") { "火星" } else { "台北" };
        return Json(completion_function_call(keyword));
    }
    Json(completion_text(REWRITE))
}

async fn search(
    State(up): State<Upstream>,
    Json(req): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    up.searches.push(None, req.clone());
    if req["keyword"] == "台北" {
        Json(taipei_pois())
    } else {
        Json(serde_json::json!({ "pois": [] }))
    }
}

async fn reply(
    State(up): State<Upstream>,
    headers: HeaderMap,
    Json(req): Json<serde_json::Value>,
) -> StatusCode {
    up.replies.push(authorization(&headers), req);
    StatusCode::OK
}

/// Gateway state wired to stubs at `base`. Credentials are passed in directly so the
/// developer's OPENAI_API_KEY / LINE_CHANNEL_* environment does not leak into the test.
fn state_for(base: &str) -> GatewayState {
    let mut config = Config::default();
    config.llm.base_url = format!("{}/v1", base);
    config.poi.url = format!("{}/api/get-poi", base);

    let llm = OpenAiClient::new(&config.llm, Some(API_KEY.to_string())).expect("llm client");
    let poi = PoiClient::new(&config.poi).expect("poi client");
    let agent = Agent::new(Arc::new(llm), Arc::new(poi));
    let line = LineChannel::new(
        base.to_string(),
        Some(ACCESS_TOKEN.to_string()),
        Some(SECRET.to_string()),
    )
    .expect("line channel");
    GatewayState::new(config, agent, line)
}

/// Start the upstream stubs and a gateway wired to them; returns (gateway URL, recorders).
async fn start() -> (String, Upstream) {
    let upstream = Upstream::default();
    let stubs = Router::new()
        .route("/v1/chat/completions", post(completions))
        .route("/api/get-poi", post(search))
        .route("/v2/bot/message/reply", post(reply))
        .with_state(upstream.clone());
    let base = serve(stubs).await;

    let url = serve(gateway::router(state_for(&base))).await;
    (url, upstream)
}

fn text_event(reply_token: &str, text: &str, group_id: Option<&str>) -> serde_json::Value {
    let source = match group_id {
        Some(g) => serde_json::json!({ "type": "group", "groupId": g, "userId": "U-user" }),
        None => serde_json::json!({ "type": "user", "userId": "U-user" }),
    };
    serde_json::json!({
        "type": "message",
        "replyToken": reply_token,
        "timestamp": 1700000000000u64,
        "source": source,
        "message": { "id": "1", "type": "text", "text": text }
    })
}

async fn post_webhook(url: &str, body: &[u8], signature: Option<String>) -> StatusCode {
    let client = reqwest::Client::new();
    let mut req = client
        .post(format!("{}/callback", url))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body.to_vec());
    if let Some(sig) = signature {
        req = req.header(SIGNATURE_HEADER, sig);
    }
    let res = req.send().await.expect("webhook request");
    StatusCode::from_u16(res.status().as_u16()).expect("status")
}

async fn post_events(url: &str, events: Vec<serde_json::Value>) -> StatusCode {
    let body = serde_json::to_vec(&serde_json::json!({
        "destination": "U-bot",
        "events": events
    }))
    .expect("encode webhook");
    let signature = sign(SECRET, &body);
    post_webhook(url, &body, Some(signature)).await
}

#[tokio::test]
async fn health_reports_running() {
    let (url, _) = start().await;

    let json: serde_json::Value = reqwest::get(format!("{}/", url))
        .await
        .expect("GET /")
        .json()
        .await
        .expect("parse JSON");

    assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
    assert!(json.get("port").and_then(|v| v.as_u64()).is_some());
}

#[tokio::test]
async fn run_gateway_serves_health_on_configured_port() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("free port");
    let mut config = Config::default();
    config.gateway.port_override = Some(port);
    config.gateway.bind = "127.0.0.1".to_string();

    let handle = tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    handle.abort();
    panic!(
        "GET {} did not return 200 with health JSON within 5s; last error: {:?}",
        url, last_err
    );
}

#[tokio::test]
async fn signed_message_gets_carousel_then_summary() {
    let (url, upstream) = start().await;

    let status = post_events(&url, vec![text_event("rt-1", "推薦台北景點", None)]).await;
    assert_eq!(status, StatusCode::OK);

    let completions = upstream.completions.all();
    assert_eq!(completions.len(), 2);
    let expected_key = format!("Bearer {}", API_KEY);
    assert_eq!(completions[0].authorization.as_deref(), Some(expected_key.as_str()));
    assert_eq!(completions[0].body["functions"][0]["name"], "search_poi");
    let summary_turn = completions[1].body["messages"].as_array().unwrap();
    assert_eq!(summary_turn.len(), 3);
    assert_eq!(summary_turn[0]["content"], "推薦台北景點");
    assert_eq!(summary_turn[1]["function_call"]["name"], "search_poi");
    assert_eq!(summary_turn[2]["role"], "function");
    assert_eq!(summary_turn[2]["name"], "search_poi");

    let searches = upstream.searches.all();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].body["keyword"], "台北");

    let replies = upstream.replies.all();
    assert_eq!(replies.len(), 1);
    let sent = &replies[0];
    let expected_token = format!("Bearer {}", ACCESS_TOKEN);
    assert_eq!(sent.authorization.as_deref(), Some(expected_token.as_str()));
    assert_eq!(sent.body["replyToken"], "rt-1");
    let messages = sent.body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["type"], "flex");
    assert_eq!(messages[0]["altText"], ALT_TEXT_PLACES);
    let bubbles = messages[0]["contents"]["contents"].as_array().unwrap();
    assert_eq!(bubbles.len(), 2);
    assert_eq!(bubbles[0]["body"]["contents"][0]["text"], "台北101");
    assert_eq!(messages[1], serde_json::json!({ "type": "text", "text": SUMMARY }));
}

#[tokio::test]
async fn nothing_found_rewrites_once_and_replies_with_text() {
    let (url, upstream) = start().await;

    let status = post_events(&url, vec![text_event("rt-2", "火星上有什麼好玩的", None)]).await;
    assert_eq!(status, StatusCode::OK);

    let completions = upstream.completions.all();
    assert_eq!(completions.len(), 3);
    assert!(completions[1].body.get("functions").is_none());
    let summary_turn = completions[2].body["messages"].as_array().unwrap();
    assert!(summary_turn[0]["content"].as_str().unwrap().ends_with("火星上有什麼好玩的"));
    assert_eq!(summary_turn[2]["content"], r#"{"pois":[]}"#);
    assert_eq!(upstream.searches.len(), 1);
    let replies = upstream.replies.all();
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0].body["messages"],
        serde_json::json!([{ "type": "text", "text": FALLBACK }])
    );
}

#[tokio::test]
async fn group_message_without_trigger_is_ignored() {
    let (url, upstream) = start().await;

    let status = post_events(&url, vec![text_event("rt-3", "推薦台北景點", Some("G-1"))]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(upstream.completions.len(), 0);
    assert_eq!(upstream.replies.len(), 0);
}

#[tokio::test]
async fn group_message_with_trigger_is_answered_without_it() {
    let (url, upstream) = start().await;

    let status = post_events(&url, vec![text_event("rt-4", ":gpt 推薦台北景點", Some("G-1"))]).await;

    assert_eq!(status, StatusCode::OK);
    let completions = upstream.completions.all();
    assert_eq!(completions[0].body["messages"][0]["content"], "推薦台北景點");
    assert_eq!(upstream.replies.len(), 1);
}

#[tokio::test]
async fn bad_signature_is_rejected_before_any_call() {
    let (url, upstream) = start().await;
    let body = serde_json::to_vec(&serde_json::json!({
        "events": [text_event("rt-5", "推薦台北景點", None)]
    }))
    .unwrap();

    let forged = post_webhook(&url, &body, Some(sign("wrong-secret", &body))).await;
    let missing = post_webhook(&url, &body, None).await;

    assert_eq!(forged, StatusCode::BAD_REQUEST);
    assert_eq!(missing, StatusCode::BAD_REQUEST);
    assert_eq!(upstream.completions.len(), 0);
}

#[tokio::test]
async fn unparsable_body_is_server_error() {
    let (url, _) = start().await;
    let body = b"{not json";

    let status = post_webhook(&url, body, Some(sign(SECRET, body))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn failing_completion_api_still_replies_with_apology() {
    let upstream = Upstream::default();
    let stubs = Router::new()
        .route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/v2/bot/message/reply", post(reply))
        .with_state(upstream.clone());
    let base = serve(stubs).await;
    let url = serve(gateway::router(state_for(&base))).await;

    let status = post_events(&url, vec![text_event("rt-6", "推薦台北景點", None)]).await;

    assert_eq!(status, StatusCode::OK);
    let replies = upstream.replies.all();
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0].body["messages"],
        serde_json::json!([{ "type": "text", "text": UNAVAILABLE_TEXT }])
    );
}
