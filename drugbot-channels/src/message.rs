//! Message types for channel communication.

use serde::{Deserialize, Serialize};

/// Inbound text message, normalized from a channel webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message ID (channel-specific)
    pub id: String,
    /// User identifier; sessions are keyed by this
    pub user_id: String,
    /// Single-use token for replying to this message
    pub reply_token: Option<String>,
    /// Raw message text
    pub text: String,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Trace ID for log correlation
    pub trace_id: String,
}

impl ChannelMessage {
    /// Text shortened for log output.
    pub fn preview(&self) -> String {
        drugbot_common::util::truncate_with_ellipsis(&self.text, 50)
    }
}
