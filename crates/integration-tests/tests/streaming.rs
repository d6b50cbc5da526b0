//! Streamed `POST /gateway/chat`: SSE reconstruction and terminal frames

mod harness;

use std::time::Duration;

use harness::config::ConfigBuilder;
use harness::mock_vendor::{Behavior, MockVendor};
use harness::server::{TestServer, chat_body, sse_data};
use serde_json::Value;

struct Streamed {
    frames: Vec<Value>,
    done_count: usize,
}

impl Streamed {
    fn text(&self) -> String {
        self.frames
            .iter()
            .filter_map(|f| f["choices"][0]["delta"]["content"].as_str())
            .collect()
    }

    fn terminal_frames(&self) -> Vec<&Value> {
        self.frames
            .iter()
            .filter(|f| !f["choices"][0]["finish_reason"].is_null())
            .collect()
    }
}

async fn collect(resp: reqwest::Response) -> Streamed {
    let body = resp.text().await.unwrap();
    let data = sse_data(&body);
    let done_count = data.iter().filter(|d| *d == "[DONE]").count();
    assert_eq!(data.last().map(String::as_str), Some("[DONE]"), "body: {body}");

    let frames = data
        .iter()
        .filter(|d| *d != "[DONE]")
        .map(|d| serde_json::from_str(d).unwrap())
        .collect();
    Streamed { frames, done_count }
}

#[tokio::test]
async fn every_interface_streams_hello_with_one_stop() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    for interface in ["openai_compatible", "gemini_native", "anthropic_native", "ollama"] {
        let resp = server.chat(&chat_body(&mock.base_url(interface), interface, true)).await;
        assert_eq!(resp.status(), 200, "{interface}");
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_owned();
        assert!(content_type.contains("text/event-stream"), "{interface}: {content_type}");

        let streamed = collect(resp).await;
        assert_eq!(streamed.text(), "Hello", "{interface}");
        assert_eq!(streamed.done_count, 1, "{interface}");

        let terminal = streamed.terminal_frames();
        assert_eq!(terminal.len(), 1, "{interface}");
        assert_eq!(terminal[0]["choices"][0]["finish_reason"], "stop");
        assert!(terminal[0].get("diagnostic").is_none());

        assert_eq!(streamed.frames[0]["object"], "chat.completion.chunk");
        assert_eq!(streamed.frames[0]["choices"][0]["delta"]["role"], "assistant");
    }
}

#[tokio::test]
async fn openai_usage_reaches_terminal_frame() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .chat(&chat_body(&mock.base_url("openai_compatible"), "openai_compatible", true))
        .await;
    let streamed = collect(resp).await;

    assert_eq!(streamed.terminal_frames()[0]["usage"]["total_tokens"], 7);
}

#[tokio::test]
async fn accept_header_selects_streaming() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/gateway/chat"))
        .header("accept", "text/event-stream")
        .json(&chat_body(&mock.base_url("openai_compatible"), "openai_compatible", false))
        .send()
        .await
        .unwrap();

    assert!(resp.headers()["content-type"].to_str().unwrap().contains("text/event-stream"));
    assert_eq!(collect(resp).await.text(), "Hello");
}

#[tokio::test]
async fn gemini_json_array_stream_is_decoded() {
    let mock = MockVendor::start_with(Behavior::JsonArrayStream).await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .chat(&chat_body(&mock.base_url("gemini_native"), "gemini_native", true))
        .await;
    let streamed = collect(resp).await;

    assert_eq!(streamed.text(), "Hello");
    assert_eq!(streamed.terminal_frames().len(), 1);
}

#[tokio::test]
async fn truncated_stream_ends_with_diagnostic_frame() {
    let mock = MockVendor::start_with(Behavior::Truncated).await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .chat(&chat_body(&mock.base_url("openai_compatible"), "openai_compatible", true))
        .await;
    assert_eq!(resp.status(), 200);

    let streamed = collect(resp).await;
    assert!(streamed.text().starts_with("He"));

    let terminal = streamed.terminal_frames();
    assert_eq!(terminal.len(), 1);
    assert!(terminal[0].get("diagnostic").is_some());
    assert_eq!(streamed.done_count, 1);
}

#[tokio::test]
async fn failed_open_is_marked_in_header() {
    let mock = MockVendor::start_with_status(401, "Incorrect API key provided").await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .chat(&chat_body(&mock.base_url("openai_compatible"), "openai_compatible", true))
        .await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-parley-diagnostic"], "unauthorized");

    let streamed = collect(resp).await;
    let terminal = streamed.terminal_frames();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0]["diagnostic"]["category"], "unauthorized");
    assert_eq!(terminal[0]["diagnostic"]["upstream_status"], 401);
    assert!(streamed.text().contains("Incorrect API key provided"));
}

#[tokio::test]
async fn malformed_stream_payload_becomes_diagnostic() {
    let mock = MockVendor::start_with(Behavior::Malformed).await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .chat(&chat_body(&mock.base_url("openai_compatible"), "openai_compatible", true))
        .await;
    assert_eq!(resp.status(), 200);

    let streamed = collect(resp).await;
    assert_eq!(streamed.terminal_frames().len(), 1);
    assert_eq!(streamed.terminal_frames()[0]["diagnostic"]["stage"], "stream-parse");
}

#[tokio::test]
async fn stalled_vendor_times_out_as_diagnostic() {
    let mock = MockVendor::start_with(Behavior::Stall(Duration::from_secs(30))).await.unwrap();
    let config = ConfigBuilder::new()
        .with_chat_timeout(Duration::from_millis(300))
        .with_stream_idle_timeout(Duration::from_millis(300))
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .chat(&chat_body(&mock.base_url("openai_compatible"), "openai_compatible", true))
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-parley-diagnostic"], "timeout");

    let streamed = collect(resp).await;
    assert_eq!(streamed.terminal_frames()[0]["diagnostic"]["category"], "timeout");
}
