//! HTTP routes for the drugbot webhook endpoints.
//!
//! - `GET /health`, `GET /ready`
//! - `POST /callback` (LINE webhook URL)
//! - `POST /webhook/line` (alias)

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::line::{LineChannel, SIGNATURE_HEADER};
use crate::message::ChannelMessage;
use drugbot_common::error::ResultExt;
use drugbot_common::Error;

/// Capacity of the webhook → processor queue.
const MESSAGE_QUEUE_CAPACITY: usize = 100;

// ============================================================================
// State
// ============================================================================

/// Shared state for the webhook server.
pub struct ChannelsState {
    /// LINE channel used for signature verification
    pub line: Arc<LineChannel>,
    /// Channel for forwarding incoming messages
    pub message_tx: mpsc::Sender<ChannelMessage>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct WebhookResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl WebhookResponse {
    fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    fn error(err: &Error) -> Self {
        Self {
            success: false,
            message: Some(err.to_string()),
        }
    }
}

// ============================================================================
// Health Routes
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "drugbot-channels",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ready(State(state): State<Arc<ChannelsState>>) -> impl IntoResponse {
    // Processor gone means messages would pile up unanswered
    if state.message_tx.is_closed() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "not_ready",
                service: "drugbot-channels",
                version: env!("CARGO_PKG_VERSION"),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ready",
            service: "drugbot-channels",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

// ============================================================================
// LINE Webhook
// ============================================================================

async fn line_webhook(
    State(state): State<Arc<ChannelsState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    match accept_line_webhook(&state, &headers, &body).await {
        Ok(forwarded) => {
            tracing::debug!(forwarded = forwarded, "LINE webhook accepted");
            (StatusCode::OK, Json(WebhookResponse::ok()))
        }
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(WebhookResponse::error(&e)))
        }
    }
}

/// Verify, parse and enqueue a LINE webhook body.
///
/// Returns the number of messages forwarded to the processor.
async fn accept_line_webhook(
    state: &ChannelsState,
    headers: &HeaderMap,
    body: &[u8],
) -> drugbot_common::Result<usize> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !state.line.verify_signature(body, signature) {
        tracing::warn!(
            "LINE webhook signature verification failed (signature: {})",
            if signature.is_empty() { "missing" } else { "invalid" }
        );
        return Err(Error::InvalidSignature);
    }

    let messages = LineChannel::parse_webhook_body(body).context("Invalid LINE webhook body")?;
    let count = messages.len();

    for msg in messages {
        tracing::info!(
            trace_id = %msg.trace_id,
            user_id = %msg.user_id,
            text = %msg.preview(),
            "LINE message received"
        );

        if let Err(e) = state.message_tx.send(msg).await {
            tracing::error!("Failed to forward LINE message: {}", e);
            return Err(Error::ChannelSend);
        }
    }

    Ok(count)
}

// ============================================================================
// Router
// ============================================================================

/// Build the webhook router.
pub fn build_router(state: Arc<ChannelsState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // LINE webhook
        .route("/callback", post(line_webhook))
        .route("/webhook/line", post(line_webhook))
        .with_state(state)
}

/// Create the webhook state together with the processor's receiver.
pub fn create_state(
    line: Arc<LineChannel>,
) -> (Arc<ChannelsState>, mpsc::Receiver<ChannelMessage>) {
    let (tx, rx) = mpsc::channel(MESSAGE_QUEUE_CAPACITY);

    let state = Arc::new(ChannelsState {
        line,
        message_tx: tx,
    });

    (state, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SECRET: &str = "test-channel-secret";

    fn create_test_state() -> (Arc<ChannelsState>, mpsc::Receiver<ChannelMessage>) {
        let line = Arc::new(LineChannel::new("test-token".into(), SECRET.into()));
        create_state(line)
    }

    fn text_event_body(user_id: &str, text: &str) -> String {
        serde_json::json!({
            "destination": "Uxxxxxxxx",
            "events": [{
                "type": "message",
                "replyToken": "nHuyWiB7yP5Zw52FIkcQobQuGDXCTA",
                "timestamp": 1_625_665_242_211_i64,
                "source": { "type": "user", "userId": user_id },
                "message": { "id": "444573844083572737", "type": "text", "text": text }
            }]
        })
        .to_string()
    }

    fn signed_request(uri: &str, state: &ChannelsState, body: String) -> Request<Body> {
        let signature = state.line.compute_signature(body.as_bytes()).unwrap();
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap()
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _rx) = create_test_state();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_endpoint() {
        let (state, _rx) = create_test_state();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_endpoint_without_processor() {
        let (state, rx) = create_test_state();
        drop(rx);
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_callback_forwards_signed_message() {
        let (state, mut rx) = create_test_state();
        let request = signed_request("/callback", &state, text_event_body("U123", "2"));
        let app = build_router(state);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["success"], true);

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.user_id, "U123");
        assert_eq!(msg.text, "2");
        assert_eq!(msg.reply_token.as_deref(), Some("nHuyWiB7yP5Zw52FIkcQobQuGDXCTA"));
    }

    #[tokio::test]
    async fn test_webhook_line_alias() {
        let (state, mut rx) = create_test_state();
        let request = signed_request("/webhook/line", &state, text_event_body("U9", "a"));
        let app = build_router(state);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.try_recv().unwrap().text, "a");
    }

    #[tokio::test]
    async fn test_signature_rejections() {
        let cases = vec![
            (None, StatusCode::BAD_REQUEST),
            (Some("bm90LWEtc2lnbmF0dXJl"), StatusCode::BAD_REQUEST),
            (Some(""), StatusCode::BAD_REQUEST),
        ];

        for (signature, expected) in cases {
            let (state, mut rx) = create_test_state();
            let app = build_router(state);

            let mut builder = Request::builder()
                .method("POST")
                .uri("/callback")
                .header("content-type", "application/json");
            if let Some(sig) = signature {
                builder = builder.header(SIGNATURE_HEADER, sig);
            }
            let request = builder
                .body(Body::from(text_event_body("U1", "1")))
                .unwrap();

            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), expected, "signature: {signature:?}");

            let json = response_json(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["message"], "Invalid signature");
            assert!(rx.try_recv().is_err(), "nothing should be forwarded");
        }
    }

    #[tokio::test]
    async fn test_tampered_body_rejected() {
        let (state, mut rx) = create_test_state();
        let original = text_event_body("U1", "1");
        let signature = state.line.compute_signature(original.as_bytes()).unwrap();
        let app = build_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/callback")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(text_event_body("U1", "2")))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_signed_malformed_body_is_bad_request() {
        let (state, _rx) = create_test_state();
        let request = signed_request("/callback", &state, "{not json".to_string());
        let app = build_router(state);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_text_events_acknowledged() {
        let (state, mut rx) = create_test_state();
        let body = serde_json::json!({
            "destination": "Uxxxxxxxx",
            "events": [
                {
                    "type": "follow",
                    "replyToken": "r1",
                    "timestamp": 0,
                    "source": { "type": "user", "userId": "U1" }
                },
                {
                    "type": "message",
                    "replyToken": "r2",
                    "timestamp": 0,
                    "source": { "type": "user", "userId": "U1" },
                    "message": { "id": "1", "type": "sticker", "packageId": "1", "stickerId": "1" }
                }
            ]
        })
        .to_string();
        let request = signed_request("/callback", &state, body);
        let app = build_router(state);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_is_server_error() {
        let (state, rx) = create_test_state();
        drop(rx);
        let request = signed_request("/callback", &state, text_event_body("U1", "1"));
        let app = build_router(state);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
