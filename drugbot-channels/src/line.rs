//! LINE channel for drugbot-channels.
//!
//! Uses the LINE Messaging API. Messages arrive via webhook (push-based) and
//! are answered through the reply endpoint with the event's reply token.

use crate::message::ChannelMessage;
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use base64::Engine;
use drugbot_common::config::LineConfig;
use drugbot_dialogue::ReplyPayload;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

// ============================================================================
// Webhook Types
// ============================================================================

/// Webhook request body.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
}

// ============================================================================
// Reply API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    emojis: Vec<Emoji<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Emoji<'a> {
    index: usize,
    product_id: &'a str,
    emoji_id: &'a str,
}

impl<'a> TextMessage<'a> {
    fn from_payload(payload: &'a ReplyPayload) -> Self {
        Self {
            kind: "text",
            text: payload.body(),
            emojis: payload
                .annotations()
                .iter()
                .map(|a| Emoji {
                    index: a.offset,
                    product_id: &a.product_id,
                    emoji_id: &a.emoji_id,
                })
                .collect(),
        }
    }
}

// ============================================================================
// Channel
// ============================================================================

/// LINE channel using the Messaging API.
pub struct LineChannel {
    channel_access_token: String,
    channel_secret: String,
    api_base: String,
    client: Client,
}

impl LineChannel {
    /// Create a new LINE channel against the public API.
    pub fn new(channel_access_token: String, channel_secret: String) -> Self {
        Self::with_api_base(
            channel_access_token,
            channel_secret,
            "https://api.line.me".to_string(),
        )
    }

    /// Create a LINE channel against a custom API base URL.
    pub fn with_api_base(
        channel_access_token: String,
        channel_secret: String,
        api_base: String,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("LINE: failed to build HTTP client, using defaults: {}", e);
                Client::new()
            });

        Self {
            channel_access_token,
            channel_secret,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &LineConfig) -> Self {
        Self::with_api_base(
            config.channel_access_token.clone(),
            config.channel_secret.clone(),
            config.api_base.clone(),
        )
    }

    fn keyed_mac(&self, body: &[u8]) -> Option<Hmac<Sha256>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.channel_secret.as_bytes()).ok()?;
        mac.update(body);
        Some(mac)
    }

    /// Compute the base64 HMAC-SHA256 signature LINE sends for `body`.
    pub fn compute_signature(&self, body: &[u8]) -> Option<String> {
        self.keyed_mac(body)
            .map(|mac| base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Verify the `X-Line-Signature` header against the raw body.
    pub fn verify_signature(&self, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim())
        else {
            return false;
        };

        // Constant-time comparison
        self.keyed_mac(body)
            .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    }

    /// Parse a webhook body into text messages from users.
    ///
    /// Non-message events, non-text messages and events without a user id
    /// are skipped.
    pub fn parse_webhook_body(body: &[u8]) -> Result<Vec<ChannelMessage>, serde_json::Error> {
        let webhook: WebhookBody = serde_json::from_slice(body)?;
        let mut messages = Vec::new();

        for event in webhook.events {
            if event.event_type != "message" {
                tracing::debug!(event_type = %event.event_type, "LINE: skipping non-message event");
                continue;
            }

            let Some(message) = event.message else {
                continue;
            };

            let Some(text) = message.text.filter(|_| message.message_type == "text") else {
                tracing::debug!(
                    message_type = %message.message_type,
                    "LINE: skipping non-text message"
                );
                continue;
            };

            let Some(user_id) = event.source.and_then(|s| s.user_id) else {
                tracing::debug!("LINE: skipping message without userId");
                continue;
            };

            messages.push(ChannelMessage {
                id: message.id,
                user_id,
                reply_token: event.reply_token,
                text,
                timestamp: event.timestamp,
                trace_id: drugbot_common::logging::generate_trace_id(),
            });
        }

        Ok(messages)
    }
}

#[async_trait]
impl Channel for LineChannel {
    fn name(&self) -> &'static str {
        "line"
    }

    async fn reply(&self, reply_token: &str, payload: &ReplyPayload) -> ChannelResult<()> {
        if payload.body().is_empty() {
            return Err(ChannelError::InvalidMessage(
                "LINE does not accept empty text messages".into(),
            ));
        }

        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = ReplyRequest {
            reply_token,
            messages: vec![TextMessage::from_payload(payload)],
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Connection(format!("LINE reply error: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            tracing::info!("LINE reply sent");
            return Ok(());
        }

        let error = resp.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ChannelError::Auth(format!("LINE rejected access token: {error}")));
        }
        Err(ChannelError::SendFailed(format!(
            "LINE API error ({status}): {error}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drugbot_dialogue::Annotation;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_channel() -> LineChannel {
        LineChannel::new("test-token".into(), "test-secret".into())
    }

    #[test]
    fn line_channel_name() {
        assert_eq!(make_channel().name(), "line");
    }

    #[test]
    fn line_channel_from_config() {
        let config = LineConfig {
            channel_access_token: "tok".into(),
            channel_secret: "sec".into(),
            api_base: "http://127.0.0.1:9000/".into(),
        };
        let ch = LineChannel::from_config(&config);
        assert_eq!(ch.api_base, "http://127.0.0.1:9000");
        assert_eq!(ch.channel_access_token, "tok");
    }

    #[test]
    fn line_signature_roundtrip() {
        let ch = make_channel();
        let body = br#"{"events":[]}"#;
        let signature = ch.compute_signature(body).unwrap();

        assert!(ch.verify_signature(body, &signature));
        assert!(!ch.verify_signature(br#"{"events":[{}]}"#, &signature));
    }

    #[test]
    fn line_signature_known_value() {
        // echo -n 'hello' | openssl dgst -sha256 -hmac 'secret' -binary | base64
        let ch = LineChannel::new("t".into(), "secret".into());
        assert!(ch.verify_signature(b"hello", "iKqz7ejTrflNJquQ07r9SiCDBww7zOnAFO4EpEOEfAs="));
    }

    #[test]
    fn line_signature_rejects_garbage() {
        let ch = make_channel();
        assert!(!ch.verify_signature(b"{}", ""));
        assert!(!ch.verify_signature(b"{}", "not base64!"));
        assert!(!ch.verify_signature(b"{}", "c2hvcnQ="));
    }

    #[test]
    fn line_parse_text_message() {
        let body = serde_json::json!({
            "destination": "Uxxxxxxxx",
            "events": [{
                "type": "message",
                "mode": "active",
                "timestamp": 1625665242211i64,
                "source": { "type": "user", "userId": "U4af4980629" },
                "replyToken": "nHuyWiB7yP5Zw52FIkcQobQuGDXCTA",
                "message": { "type": "text", "id": "444573844083572737", "text": "2" }
            }]
        });

        let msgs = LineChannel::parse_webhook_body(body.to_string().as_bytes()).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].user_id, "U4af4980629");
        assert_eq!(msgs[0].text, "2");
        assert_eq!(msgs[0].reply_token.as_deref(), Some("nHuyWiB7yP5Zw52FIkcQobQuGDXCTA"));
        assert_eq!(msgs[0].timestamp, 1625665242211);
    }

    #[test]
    fn line_parse_skips_other_events() {
        let body = serde_json::json!({
            "events": [
                { "type": "follow", "replyToken": "r1", "source": { "type": "user", "userId": "U1" } },
                {
                    "type": "message", "replyToken": "r2",
                    "source": { "type": "user", "userId": "U1" },
                    "message": { "type": "sticker", "id": "1", "packageId": "446", "stickerId": "1988" }
                },
                {
                    "type": "message", "replyToken": "r3",
                    "source": { "type": "group", "groupId": "G1" },
                    "message": { "type": "text", "id": "2", "text": "1" }
                }
            ]
        });

        let msgs = LineChannel::parse_webhook_body(body.to_string().as_bytes()).unwrap();
        assert!(msgs.is_empty());
    }

    #[test]
    fn line_parse_verification_request() {
        // The console's "Verify" button sends an empty event list.
        let msgs = LineChannel::parse_webhook_body(br#"{"destination":"U1","events":[]}"#).unwrap();
        assert!(msgs.is_empty());
    }

    #[test]
    fn line_parse_invalid_json() {
        assert!(LineChannel::parse_webhook_body(b"not json").is_err());
    }

    #[tokio::test]
    async fn line_reply_with_emojis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/reply"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_json(serde_json::json!({
                "replyToken": "token-1",
                "messages": [{
                    "type": "text",
                    "text": "drink water $",
                    "emojis": [{ "index": 12, "productId": "5ac21e6c040ab15980c9b444", "emojiId": "104" }]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let ch = LineChannel::with_api_base("test-token".into(), "s".into(), server.uri());
        let payload = ReplyPayload::annotated(
            "drink water $",
            vec![Annotation {
                offset: 12,
                product_id: "5ac21e6c040ab15980c9b444".into(),
                emoji_id: "104".into(),
            }],
        );

        ch.reply("token-1", &payload).await.unwrap();
    }

    #[tokio::test]
    async fn line_reply_plain_text_omits_emojis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/reply"))
            .and(body_json(serde_json::json!({
                "replyToken": "token-2",
                "messages": [{ "type": "text", "text": "hello" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let ch = LineChannel::with_api_base("test-token".into(), "s".into(), format!("{}/", server.uri()));
        ch.reply("token-2", &ReplyPayload::text("hello")).await.unwrap();
    }

    #[tokio::test]
    async fn line_reply_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/reply"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"message":"Invalid reply token"}"#),
            )
            .mount(&server)
            .await;

        let ch = LineChannel::with_api_base("test-token".into(), "s".into(), server.uri());
        let err = ch
            .reply("expired", &ReplyPayload::text("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::SendFailed(ref msg) if msg.contains("Invalid reply token")));
    }

    #[tokio::test]
    async fn line_reply_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{}"))
            .mount(&server)
            .await;

        let ch = LineChannel::with_api_base("bad".into(), "s".into(), server.uri());
        let err = ch.reply("t", &ReplyPayload::text("x")).await.unwrap_err();
        assert!(matches!(err, ChannelError::Auth(_)));
    }

    #[tokio::test]
    async fn line_reply_rejects_empty_text() {
        let ch = make_channel();
        let err = ch.reply("t", &ReplyPayload::text("")).await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidMessage(_)));
    }
}
