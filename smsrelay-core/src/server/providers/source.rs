//! Message source: inbound subscription feeds

use crate::models::InboundMessage;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised by a subscription feed
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Subscription {0} could not be opened: {1}")]
    Open(String, String),

    #[error("Feed for {0} is already attached")]
    AlreadyAttached(String),

    #[error("Acknowledging message {message_id} failed: {reason}")]
    Ack { message_id: String, reason: String },

    #[error("Source request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// One delivery from an attached feed
#[derive(Debug)]
pub enum SourceEvent {
    Message(InboundMessage),
    /// Terminal stream failure unrelated to any single message
    Error(String),
}

/// Push-based subscription feed.
///
/// `attach` starts delivery into the returned channel; `detach` stops it and
/// may be called any number of times. The source does not interpret payloads.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Source name for logging (e.g. "pubsub").
    fn name(&self) -> &str;

    /// Start the feed.
    async fn attach(&self) -> Result<mpsc::Receiver<SourceEvent>, SourceError>;

    /// Stop delivering. Idempotent.
    async fn detach(&self);

    /// Release one message so it is not redelivered.
    async fn acknowledge(&self, message: &InboundMessage) -> Result<(), SourceError>;
}

/// Opens a feed for a named subscription.
///
/// `intake_limit` is the most messages the session will admit. Sources that
/// lease messages from a broker must not lease more than that.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn open(
        &self,
        subscription: &str,
        intake_limit: usize,
    ) -> Result<Arc<dyn MessageSource>, SourceError>;
}
