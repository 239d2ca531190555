//! Helpers for integration tests: local stub servers standing in for the completion API,
//! the POI service and the LINE reply API.

#![allow(dead_code)]

use axum::Router;
use std::sync::{Arc, Mutex};

/// Serve `app` on a free loopback port; returns its base URL. The task is left running.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// Requests seen by a stub, in arrival order.
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Vec<Recorded>>>,
}

#[derive(Clone, Debug)]
pub struct Recorded {
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

impl Recorder {
    pub fn push(&self, authorization: Option<String>, body: serde_json::Value) {
        self.inner.lock().unwrap().push(Recorded {
            authorization,
            body,
        });
    }

    pub fn all(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

pub fn authorization(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn completion_text(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
}

pub fn completion_function_call(keyword: &str) -> serde_json::Value {
    let arguments = serde_json::json!({ "keyword": keyword }).to_string();
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "function_call": { "name": "search_poi", "arguments": arguments }
            },
            "finish_reason": "function_call"
        }]
    })
}

pub fn taipei_pois() -> serde_json::Value {
    serde_json::json!({
        "pois": [
            {
                "poiURL": "https://example.com/poi/101",
                "coverPhoto": "https://example.com/img/101.jpg",
                "name": "台北101",
                "nickname": ["101大樓"]
            },
            {
                "poiURL": "https://example.com/poi/npm",
                "coverPhoto": "",
                "name": "國立故宮博物院",
                "nickname": []
            }
        ]
    })
}
