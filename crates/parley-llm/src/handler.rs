//! Axum routes for `/gateway/chat` and `/gateway/models`

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::StreamExt;
use http::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use http::{HeaderMap, HeaderValue, StatusCode};
use parley_core::{ErrorCategory, ErrorInfo, HttpError};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::error::LlmError;
use crate::gateway::{Frame, Gateway, diagnostic_body, success_body};
use crate::protocol::gateway::{DIAGNOSTIC_HEADER, GatewayChatRequest, ModelList, TargetSpec};

const BASE_URL_HEADER: &str = "x-api-base-url";
const API_KEY_HEADER: &str = "x-api-key";
const INTERFACE_HEADER: &str = "x-api-interface";

/// Gateway routes; every response is marked `Cache-Control: no-store`
pub fn gateway_router(gateway: Gateway) -> Router {
    Router::new()
        .route("/gateway/chat", routing::post(chat))
        .route("/gateway/models", routing::get(models).post(models))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(gateway)
}

/// Handle `POST /gateway/chat`
async fn chat(
    State(gateway): State<Gateway>,
    headers: HeaderMap,
    body: Result<Json<GatewayChatRequest>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return error_response(&LlmError::InvalidRequest(rejection.body_text())),
    };

    let wants_stream = body.payload.stream || accepts_event_stream(&headers);
    let chat = match gateway.prepare(body) {
        Ok(chat) => chat,
        Err(error) => return error_response(&error),
    };

    tracing::debug!(
        interface = %chat.interface(),
        model = chat.model(),
        stream = wants_stream,
        "dispatching chat request"
    );

    if wants_stream {
        let (frames, failure) = gateway.open_stream(chat).await;
        let events = frames.map(|frame| {
            Ok::<_, Infallible>(match frame {
                Frame::Chunk(chunk) => Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()),
                Frame::Done => Event::default().data("[DONE]"),
            })
        });

        let mut response = Sse::new(events).keep_alive(KeepAlive::default()).into_response();
        if let Some(category) = failure {
            mark_diagnostic(&mut response, category);
        }
        return response;
    }

    match gateway.complete(&chat).await {
        Ok(response) => Json(success_body(response)).into_response(),
        Err(info) => diagnostic_response(&info, chat.model()),
    }
}

/// Handle `GET|POST /gateway/models`
///
/// The target comes from a JSON body, from headers, or both; body fields win.
async fn models(State(gateway): State<Gateway>, headers: HeaderMap, body: Bytes) -> Response {
    let mut target = if body.iter().all(u8::is_ascii_whitespace) {
        TargetSpec::default()
    } else {
        match serde_json::from_slice::<TargetSpec>(&body) {
            Ok(target) => target,
            Err(e) => return error_response(&LlmError::InvalidRequest(format!("invalid JSON body: {e}"))),
        }
    };
    fill_from_headers(&mut target, &headers);

    match gateway.models(&target).await {
        Ok(ids) => Json(ModelList::new(ids)).into_response(),
        Err(error) => error_response(&error),
    }
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("text/event-stream"))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn fill_from_headers(target: &mut TargetSpec, headers: &HeaderMap) {
    if target.api_base_url.trim().is_empty()
        && let Some(base) = header_str(headers, BASE_URL_HEADER)
    {
        base.clone_into(&mut target.api_base_url);
    }

    if target.api_key.trim().is_empty() {
        let bearer = header_str(headers, AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")));
        if let Some(key) = header_str(headers, API_KEY_HEADER).or(bearer) {
            key.trim().clone_into(&mut target.api_key);
        }
    }

    if target.api_interface.is_none() {
        target.api_interface = header_str(headers, INTERFACE_HEADER).map(str::to_owned);
    }
}

fn error_response(error: &LlmError) -> Response {
    let status = error.status_code();
    if error.is_rejection() {
        tracing::info!(error = %error, "request rejected");
    } else if status.is_server_error() {
        tracing::warn!(status = status.as_u16(), stage = %error.stage(), error = %error, "gateway call failed");
    }
    (status, Json(error.error_body())).into_response()
}

fn diagnostic_response(info: &ErrorInfo, model: &str) -> Response {
    let mut response = (StatusCode::OK, Json(diagnostic_body(info, model))).into_response();
    mark_diagnostic(&mut response, info.category());
    response
}

fn mark_diagnostic(response: &mut Response, category: ErrorCategory) {
    response
        .headers_mut()
        .insert(DIAGNOSTIC_HEADER, HeaderValue::from_static(category.as_str()));
}
