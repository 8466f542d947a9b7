//! SMS sink: outbound delivery to an SMS provider

use crate::models::SmsMessage;
use async_trait::async_trait;
use thiserror::Error;

/// Delivery failure reported by a sink. Recorded per message; never aborts a session.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Invalid phone number format: {0}")]
    InvalidNumber(String),

    #[error("Provider API error {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Send rejected: {0}")]
    Rejected(String),
}

/// Sink for delivering one SMS to a provider (e.g. Twilio).
#[async_trait]
pub trait SmsSink: Send + Sync {
    /// Provider name for logging (e.g. "twilio").
    fn name(&self) -> &str;

    /// Send one message. The destination has already been routed.
    async fn send(&self, message: &SmsMessage) -> Result<(), SinkError>;
}
