//! Chat endpoint: retrieval-grounded, streamed answer.
//!
//! The response is a server-sent event sequence: one `sources` event with
//! the final citation list, repeated `content` events carrying text
//! fragments, then a terminal `done` event. A failure after headers have
//! been sent becomes an `error` event with a user-facing apology. The
//! client disconnecting drops the stream, which stops consuming the
//! generation channel and cancels the upstream request.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::warn;

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest};
use crate::rag::Source;
use crate::state::AppState;

/// Recent turns folded into the generation request; history itself lives
/// with the caller and is never persisted here.
const MAX_HISTORY_TURNS: usize = 6;

const APOLOGY: &str =
    "Sorry - something went wrong while answering. Please try again in a moment.";

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatPayload>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let message = payload
        .message
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest(
            "missing required field: message".to_string(),
        ));
    }

    // Retrieval failures abort the request before any event is sent; the
    // caller sees the apology, the upstream detail stays in the logs.
    let assembled = state
        .engine
        .answer_context(&message)
        .await
        .map_err(sanitize_upstream)?;

    let mut messages = vec![ChatMessage::system(&assembled.system_prompt)];
    let tail_start = payload.history.len().saturating_sub(MAX_HISTORY_TURNS);
    for turn in &payload.history[tail_start..] {
        match turn.role.as_str() {
            "assistant" => messages.push(ChatMessage::assistant(&turn.content)),
            "user" => messages.push(ChatMessage::user(&turn.content)),
            other => warn!(role = other, "dropping history turn with unknown role"),
        }
    }
    messages.push(ChatMessage::user(&message));

    let rx = state
        .provider
        .stream_chat(ChatRequest::new(messages))
        .await
        .map_err(sanitize_upstream)?;

    Ok(Sse::new(event_stream(assembled.sources, rx)).keep_alive(KeepAlive::default()))
}

/// Replaces upstream failure detail with the user-facing apology while
/// keeping the error class (and so the status code). Client-side errors
/// pass through untouched.
fn sanitize_upstream(err: ApiError) -> ApiError {
    match err {
        ApiError::Upstream(_) | ApiError::Timeout(_) => {
            warn!(error = %err, retryable = err.is_retryable(), "query failed upstream");
            if err.is_retryable() {
                ApiError::Timeout(APOLOGY.to_string())
            } else {
                ApiError::Upstream(APOLOGY.to_string())
            }
        }
        other => other,
    }
}

enum StreamState {
    Streaming(mpsc::Receiver<Result<String, ApiError>>),
    Closed,
}

fn event_stream(
    sources: Vec<Source>,
    rx: mpsc::Receiver<Result<String, ApiError>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let first = stream::once(async move { Ok(sources_event(&sources)) });

    let tail = stream::unfold(StreamState::Streaming(rx), |state| async move {
        match state {
            StreamState::Streaming(mut rx) => match rx.recv().await {
                Some(Ok(delta)) => {
                    Some((Ok(content_event(&delta)), StreamState::Streaming(rx)))
                }
                Some(Err(err)) => {
                    warn!(error = %err, "generation stream failed mid-response");
                    Some((Ok(error_event()), StreamState::Closed))
                }
                None => Some((Ok(done_event()), StreamState::Closed)),
            },
            StreamState::Closed => None,
        }
    });

    first.chain(tail)
}

fn sources_event(sources: &[Source]) -> Event {
    Event::default()
        .event("sources")
        .json_data(sources)
        .unwrap_or_else(|_| Event::default().event("sources").data("[]"))
}

fn content_event(delta: &str) -> Event {
    Event::default()
        .event("content")
        .json_data(json!({ "delta": delta }))
        .unwrap_or_else(|_| Event::default().event("content").data("{}"))
}

fn error_event() -> Event {
    Event::default()
        .event("error")
        .json_data(json!({ "message": APOLOGY }))
        .unwrap_or_else(|_| Event::default().event("error").data("{}"))
}

fn done_event() -> Event {
    Event::default().event("done").data("{}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn upstream_detail_is_replaced_with_the_apology() {
        let err = sanitize_upstream(ApiError::Upstream(
            "error sending request for url (http://10.0.0.3:9999/v1/embeddings)".to_string(),
        ));
        match &err {
            ApiError::Upstream(msg) => assert_eq!(msg, APOLOGY),
            other => panic!("wrong variant: {:?}", other),
        }
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn timeouts_stay_retryable_but_carry_the_apology() {
        let err = sanitize_upstream(ApiError::Timeout("operation timed out".to_string()));
        assert!(err.is_retryable());
        match &err {
            ApiError::Timeout(msg) => assert_eq!(msg, APOLOGY),
            other => panic!("wrong variant: {:?}", other),
        }
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn client_errors_pass_through_unchanged() {
        let err = sanitize_upstream(ApiError::BadRequest("missing required field".to_string()));
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == "missing required field"));
    }
}
