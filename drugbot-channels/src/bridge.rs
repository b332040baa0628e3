//! Dialogue bridge for drugbot-channels.
//!
//! Handles the complete message flow:
//! 1. Receive ChannelMessage from the webhook queue
//! 2. Resolve it against the user's session
//! 3. Send the reply back through the originating channel

use crate::message::ChannelMessage;
use crate::traits::{Channel, ChannelResult};
use drugbot_common::channel_span;
use drugbot_dialogue::{Clock, DialogueResolver, ReplyPayload};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Bridge between the LINE webhook and the dialogue resolver.
pub struct DialogueBridge {
    resolver: DialogueResolver,
    channel: Arc<dyn Channel>,
    clock: Arc<dyn Clock>,
}

impl DialogueBridge {
    /// Create a new bridge.
    pub fn new(
        resolver: DialogueResolver,
        channel: Arc<dyn Channel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            channel,
            clock,
        }
    }

    pub fn resolver(&self) -> &DialogueResolver {
        &self.resolver
    }

    /// Decide the reply for a message, updating the sender's session.
    pub fn resolve(&self, message: &ChannelMessage) -> ReplyPayload {
        let span = channel_span!(self.channel.name(), message.trace_id, message.user_id);
        let _enter = span.enter();

        let (reply, branch) =
            self.resolver
                .resolve_with_branch(&message.user_id, &message.text, self.clock.now());

        tracing::info!(
            message_id = %message.id,
            event_timestamp = message.timestamp,
            branch = branch.as_str(),
            text = %message.preview(),
            "Resolved message"
        );
        reply
    }

    /// Send `reply` using the message's reply token.
    pub async fn deliver(&self, message: &ChannelMessage, reply: &ReplyPayload) -> ChannelResult<()> {
        let Some(ref reply_token) = message.reply_token else {
            tracing::debug!(
                trace_id = %message.trace_id,
                message_id = %message.id,
                "No reply token, dropping reply"
            );
            return Ok(());
        };

        self.channel.reply(reply_token, reply).await
    }

    /// Resolve and deliver a single message.
    pub async fn process(&self, message: ChannelMessage) -> ChannelResult<()> {
        let reply = self.resolve(&message);
        self.deliver(&message, &reply).await
    }

    /// Start a background processor that handles messages from the webhook queue.
    ///
    /// Messages are resolved in arrival order so a user's selection always
    /// lands before a following confirmation; only delivery runs concurrently.
    /// The task ends once every sender is dropped and all queued messages have
    /// been resolved and delivered.
    pub fn spawn_processor(
        bridge: Arc<Self>,
        mut rx: mpsc::Receiver<ChannelMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Dialogue bridge processor started");

            let mut deliveries = JoinSet::new();

            while let Some(message) = rx.recv().await {
                let reply = bridge.resolve(&message);
                let bridge = bridge.clone();

                deliveries.spawn(async move {
                    if let Err(e) = bridge.deliver(&message, &reply).await {
                        tracing::error!(
                            trace_id = %message.trace_id,
                            user_id = %message.user_id,
                            error = %e,
                            "Failed to deliver reply"
                        );
                    }
                });

                // Reap finished deliveries
                while deliveries.try_join_next().is_some() {}
            }

            if !deliveries.is_empty() {
                tracing::info!(pending = deliveries.len(), "Draining reply deliveries");
            }
            while deliveries.join_next().await.is_some() {}

            tracing::info!("Dialogue bridge processor stopped");
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
