//! Channel traits for implementing channel adapters.

use async_trait::async_trait;
use drugbot_dialogue::ReplyPayload;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// Outbound side of a messaging channel.
///
/// Implement this trait to deliver dialogue replies through a platform.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name.
    fn name(&self) -> &'static str;

    /// Reply to an inbound message identified by its reply token.
    async fn reply(&self, reply_token: &str, payload: &ReplyPayload) -> ChannelResult<()>;
}
