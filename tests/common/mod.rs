//! Shared test utilities
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

/// A mock chat-completion endpoint bound to a local port
pub struct ChatEndpoint {
    /// Full URL of the `/api/chat` route
    pub url: String,

    /// Request bodies received, in arrival order
    pub requests: Arc<Mutex<Vec<Value>>>,
}

impl ChatEndpoint {
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    #[must_use]
    pub fn request(&self, index: usize) -> Value {
        self.requests.lock().expect("requests lock")[index].clone()
    }
}

#[derive(Clone)]
struct EndpointState {
    status: StatusCode,
    body: String,
    requests: Arc<Mutex<Vec<Value>>>,
    gate: Option<Arc<Semaphore>>,
}

async fn chat_handler(
    State(state): State<EndpointState>,
    axum::Json(body): axum::Json<Value>,
) -> (StatusCode, String) {
    state.requests.lock().expect("requests lock").push(body);
    if let Some(gate) = &state.gate {
        let permit = gate.acquire().await.expect("gate closed");
        permit.forget();
    }
    (state.status, state.body.clone())
}

async fn spawn_endpoint(state: EndpointState) -> ChatEndpoint {
    let requests = Arc::clone(&state.requests);
    let app = Router::new().route("/api/chat", post(chat_handler)).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock endpoint");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock endpoint");
    });

    ChatEndpoint { url: format!("http://{addr}/api/chat"), requests }
}

/// Response body in the shape Ollama's non-streaming `/api/chat` returns
#[must_use]
pub fn ollama_reply(content: &str) -> String {
    json!({
        "model": "llama3",
        "created_at": "2025-01-01T00:00:00Z",
        "message": {"role": "assistant", "content": content},
        "done": true
    })
    .to_string()
}

/// Endpoint answering every request with the given assistant reply
pub async fn chat_endpoint(reply: &str) -> ChatEndpoint {
    spawn_endpoint(EndpointState {
        status: StatusCode::OK,
        body: ollama_reply(reply),
        requests: Arc::new(Mutex::new(Vec::new())),
        gate: None,
    })
    .await
}

/// Endpoint answering with a fixed non-success status
pub async fn failing_chat_endpoint(status: u16) -> ChatEndpoint {
    spawn_endpoint(EndpointState {
        status: StatusCode::from_u16(status).expect("status code"),
        body: r#"{"error":"model runner crashed"}"#.to_string(),
        requests: Arc::new(Mutex::new(Vec::new())),
        gate: None,
    })
    .await
}

/// Endpoint answering with an arbitrary raw body
pub async fn raw_chat_endpoint(body: &str) -> ChatEndpoint {
    spawn_endpoint(EndpointState {
        status: StatusCode::OK,
        body: body.to_string(),
        requests: Arc::new(Mutex::new(Vec::new())),
        gate: None,
    })
    .await
}

/// Endpoint that holds every response until the returned gate gets a
/// permit, keeping the caller's request in flight
pub async fn gated_chat_endpoint(reply: &str) -> (ChatEndpoint, Arc<Semaphore>) {
    let gate = Arc::new(Semaphore::new(0));
    let endpoint = spawn_endpoint(EndpointState {
        status: StatusCode::OK,
        body: ollama_reply(reply),
        requests: Arc::new(Mutex::new(Vec::new())),
        gate: Some(Arc::clone(&gate)),
    })
    .await;
    (endpoint, gate)
}
