//! Mock vendor backend for integration tests
//!
//! Serves the four wire protocols the gateway speaks, each under its own
//! prefix, with canned replies and scripted failure modes.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// How the mock answers chat calls
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Canned replies, one per call; the last one repeats
    Reply(Vec<String>),
    /// Fixed status with a JSON error body
    Status(u16, String),
    /// 200 with a body that is not JSON
    Malformed,
    /// Body or stream cut off mid-object
    Truncated,
    /// 400 whenever the request carries an image part
    RejectImages,
    /// Gemini streams come back as a pretty-printed JSON array
    JsonArrayStream,
    /// Sleep before answering
    Stall(Duration),
}

/// Mock vendor that records what it receives
pub struct MockVendor {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    behavior: Behavior,
    chat_count: AtomicU32,
    models_count: AtomicU32,
    requests: Mutex<Vec<Value>>,
    auth: Mutex<Vec<String>>,
}

impl MockVendor {
    /// Start a mock that answers every chat with "Hello"
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(Behavior::Reply(vec!["Hello".to_owned()])).await
    }

    pub async fn start_with_replies(replies: &[&str]) -> anyhow::Result<Self> {
        Self::start_with(Behavior::Reply(replies.iter().map(|r| (*r).to_owned()).collect())).await
    }

    pub async fn start_with_status(status: u16, message: &str) -> anyhow::Result<Self> {
        let body = json!({"error": {"message": message, "type": "mock_error"}}).to_string();
        Self::start_with(Behavior::Status(status, body)).await
    }

    pub async fn start_with(behavior: Behavior) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            behavior,
            chat_count: AtomicU32::new(0),
            models_count: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            auth: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/openai/v1/chat/completions", routing::post(openai_chat))
            .route("/openai/v1/models", routing::get(openai_models))
            .route("/gemini/v1beta/models", routing::get(gemini_models))
            .route("/gemini/v1beta/models/{call}", routing::post(gemini_chat))
            .route("/anthropic/v1/messages", routing::post(anthropic_chat))
            .route("/anthropic/v1/models", routing::get(openai_models))
            .route("/ollama/api/chat", routing::post(ollama_chat))
            .route("/ollama/api/tags", routing::get(ollama_tags))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for an interface, as a user would paste it
    pub fn base_url(&self, interface: &str) -> String {
        let prefix = match interface {
            "gemini_native" => "gemini/v1beta",
            "anthropic_native" => "anthropic/v1",
            "ollama" => "ollama/api",
            _ => "openai/v1",
        };
        format!("http://{}/{prefix}", self.addr)
    }

    pub fn chat_count(&self) -> u32 {
        self.state.chat_count.load(Ordering::Relaxed)
    }

    pub fn models_count(&self) -> u32 {
        self.state.models_count.load(Ordering::Relaxed)
    }

    /// Chat request bodies in arrival order
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Credential header of each chat request, whichever scheme was used
    pub fn credentials(&self) -> Vec<String> {
        self.state.auth.lock().unwrap().clone()
    }
}

impl Drop for MockVendor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- request bookkeeping --

enum Outcome {
    Reply(String),
    Fail(Response),
}

impl MockState {
    /// Record the call and decide what to answer
    async fn record(&self, headers: &HeaderMap, body: Value) -> Outcome {
        let index = self.chat_count.fetch_add(1, Ordering::Relaxed) as usize;

        let credential = ["authorization", "x-api-key", "x-goog-api-key"]
            .iter()
            .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
            .unwrap_or_default()
            .to_owned();
        self.auth.lock().unwrap().push(credential);

        let has_image = body.to_string().contains("image_url");
        self.requests.lock().unwrap().push(body);

        match &self.behavior {
            Behavior::Reply(replies) => {
                let reply = replies.get(index).or_else(|| replies.last()).cloned().unwrap_or_default();
                Outcome::Reply(reply)
            }
            Behavior::Status(status, body) => Outcome::Fail(status_response(*status, body.clone())),
            Behavior::Malformed => Outcome::Fail(raw_response(
                StatusCode::OK,
                "application/json",
                "<html>upstream hiccup</html>".to_owned(),
            )),
            Behavior::RejectImages if has_image => Outcome::Fail(status_response(
                400,
                json!({"error": {"message": "image input is not supported by this model"}}).to_string(),
            )),
            Behavior::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Outcome::Reply("Too late".to_owned())
            }
            Behavior::Truncated | Behavior::RejectImages | Behavior::JsonArrayStream => {
                Outcome::Reply("Hello".to_owned())
            }
        }
    }

    fn truncated(&self) -> bool {
        matches!(self.behavior, Behavior::Truncated)
    }

    fn count_models(&self) -> Option<Response> {
        self.models_count.fetch_add(1, Ordering::Relaxed);
        match &self.behavior {
            Behavior::Status(status, body) => Some(status_response(*status, body.clone())),
            _ => None,
        }
    }
}

fn status_response(status: u16, body: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    raw_response(status, "application/json", body)
}

fn raw_response(status: StatusCode, content_type: &'static str, body: String) -> Response {
    (status, [(CONTENT_TYPE, content_type)], body).into_response()
}

fn sse(events: &[Value], done: bool, tail: Option<&str>) -> Response {
    let mut body = String::new();
    for event in events {
        body.push_str(&format!("data: {event}\n\n"));
    }
    if done {
        body.push_str("data: [DONE]\n\n");
    }
    if let Some(tail) = tail {
        body.push_str(tail);
    }
    raw_response(StatusCode::OK, "text/event-stream", body)
}

/// Split a reply into two stream pieces on a char boundary
fn halves(text: &str) -> (String, String) {
    let mid = text.chars().count() / 2;
    let head: String = text.chars().take(mid).collect();
    let tail: String = text.chars().skip(mid).collect();
    (head, tail)
}

fn wants_stream(body: &Value) -> bool {
    body.get("stream").and_then(Value::as_bool).unwrap_or(false)
}

// -- OpenAI-compatible --

async fn openai_chat(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let stream = wants_stream(&body);
    let model = body["model"].as_str().unwrap_or_default().to_owned();

    let reply = match state.record(&headers, body).await {
        Outcome::Reply(reply) => reply,
        Outcome::Fail(response) if stream && matches!(state.behavior, Behavior::Malformed) => {
            drop(response);
            return sse(&[], false, Some("data: {not json at all\n\n"));
        }
        Outcome::Fail(response) => return response,
    };

    if !stream {
        let body = json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "created": 0,
            "model": model,
            "choices": [{"index": 0, "message": {"role": "assistant", "content": reply}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })
        .to_string();
        if state.truncated() {
            return raw_response(StatusCode::OK, "application/json", body[..body.len() / 2].to_owned());
        }
        return raw_response(StatusCode::OK, "application/json", body);
    }

    let chunk = |delta: Value, finish: Value| {
        json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion.chunk",
            "created": 0,
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish}]
        })
    };

    let (head, tail) = halves(&reply);
    if state.truncated() {
        return sse(
            &[chunk(json!({"role": "assistant", "content": head}), Value::Null)],
            false,
            Some(r#"data: {"id":"chatcmpl-mock","choices":[{"index":0,"delta":{"content":"#),
        );
    }

    sse(
        &[
            chunk(json!({"role": "assistant", "content": head}), Value::Null),
            chunk(json!({"content": tail}), Value::Null),
            chunk(json!({}), json!("stop")),
            json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion.chunk",
                "created": 0,
                "model": model,
                "choices": [],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
            }),
        ],
        true,
        None,
    )
}

async fn openai_models(State(state): State<Arc<MockState>>) -> Response {
    if let Some(failure) = state.count_models() {
        return failure;
    }
    Json(json!({
        "object": "list",
        "data": [
            {"id": "mock-model", "object": "model", "owned_by": "mock"},
            {"id": "mock-model-mini", "object": "model", "owned_by": "mock"}
        ]
    }))
    .into_response()
}

// -- Gemini --

#[derive(Debug, Deserialize)]
struct GeminiQuery {
    alt: Option<String>,
}

fn gemini_chunk(text: &str, finish: Option<&str>) -> Value {
    let mut candidate = json!({"content": {"role": "model", "parts": [{"text": text}]}});
    if let Some(finish) = finish {
        candidate["finishReason"] = json!(finish);
    }
    json!({
        "candidates": [candidate],
        "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 2, "totalTokenCount": 7}
    })
}

async fn gemini_chat(
    State(state): State<Arc<MockState>>,
    axum::extract::Path(call): axum::extract::Path<String>,
    Query(query): Query<GeminiQuery>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let streaming = call.ends_with(":streamGenerateContent");
    let reply = match state.record(&headers, body).await {
        Outcome::Reply(reply) => reply,
        Outcome::Fail(response) => return response,
    };

    if !streaming {
        return Json(gemini_chunk(&reply, Some("STOP"))).into_response();
    }

    let (head, tail) = halves(&reply);
    let chunks = [gemini_chunk(&head, None), gemini_chunk(&tail, Some("STOP"))];

    if matches!(state.behavior, Behavior::JsonArrayStream) || query.alt.as_deref() != Some("sse") {
        let pretty = serde_json::to_string_pretty(&chunks).unwrap_or_default();
        return raw_response(StatusCode::OK, "application/json", pretty);
    }

    let mut body = String::new();
    for chunk in &chunks {
        body.push_str(&format!("data: {chunk}\r\n\r\n"));
    }
    raw_response(StatusCode::OK, "text/event-stream", body)
}

async fn gemini_models(State(state): State<Arc<MockState>>) -> Response {
    if let Some(failure) = state.count_models() {
        return failure;
    }
    Json(json!({
        "models": [
            {"name": "models/gemini-mock", "supportedGenerationMethods": ["generateContent", "countTokens"]},
            {"name": "models/embedding-mock", "supportedGenerationMethods": ["embedContent"]}
        ]
    }))
    .into_response()
}

// -- Anthropic --

async fn anthropic_chat(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let model = body["model"].as_str().unwrap_or_default().to_owned();
    let reply = match state.record(&headers, body).await {
        Outcome::Reply(reply) => reply,
        Outcome::Fail(response) => return response,
    };

    Json(json!({
        "id": "msg_mock",
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": [{"type": "text", "text": reply}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 5, "output_tokens": 2}
    }))
    .into_response()
}

// -- Ollama --

async fn ollama_chat(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let stream = wants_stream(&body);
    let model = body["model"].as_str().unwrap_or_default().to_owned();
    let reply = match state.record(&headers, body).await {
        Outcome::Reply(reply) => reply,
        Outcome::Fail(response) => return response,
    };

    let line = |content: &str, done: bool| {
        let mut value = json!({
            "model": model,
            "message": {"role": "assistant", "content": content},
            "done": done
        });
        if done {
            value["done_reason"] = json!("stop");
            value["prompt_eval_count"] = json!(5);
            value["eval_count"] = json!(2);
        }
        value
    };

    if !stream {
        return Json(line(&reply, true)).into_response();
    }

    let (head, tail) = halves(&reply);
    let body = format!("{}\n{}\n{}\n", line(&head, false), line(&tail, false), line("", true));
    raw_response(StatusCode::OK, "application/x-ndjson", body)
}

async fn ollama_tags(State(state): State<Arc<MockState>>) -> Response {
    if let Some(failure) = state.count_models() {
        return failure;
    }
    Json(json!({"models": [{"name": "llama3:8b"}, {"name": "qwen2:7b"}]})).into_response()
}
