//! Single-message relay: decode an envelope, route it and hand it to the SMS sink

use crate::envelope::{decode_envelope, decode_inbound, DecodedEnvelope, EnvelopeError};
use crate::models::{InboundMessage, SmsMessage};
use crate::server::providers::{SinkError, SmsSink};
use crate::services::logging::log_delivery;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Failure relaying one message
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{0}")]
    Format(#[from] EnvelopeError),

    #[error("{0}")]
    Sink(#[from] SinkError),
}

/// Delivers decoded messages to an injected sink, applying the routing override.
#[derive(Clone)]
pub struct Relay {
    sink: Arc<dyn SmsSink>,
    override_to: Option<String>,
}

impl Relay {
    pub fn new(sink: Arc<dyn SmsSink>) -> Self {
        Self {
            sink,
            override_to: None,
        }
    }

    /// Reroute every message to `to` (empty strings are ignored)
    pub fn with_override_to(mut self, to: Option<String>) -> Self {
        self.override_to = to.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Send one SMS through the sink
    pub async fn deliver(&self, message_id: &str, sms: SmsMessage) -> Result<(), SinkError> {
        let sms = match &self.override_to {
            Some(to) => {
                tracing::debug!(message_id = message_id, "Destination overridden");
                sms.routed_to(to)
            }
            None => sms,
        };
        let result = self.sink.send(&sms).await;
        let error = result.as_ref().err().map(|e| e.to_string());
        log_delivery(self.sink.name(), message_id, error.as_deref());
        result
    }

    async fn deliver_decoded(&self, decoded: DecodedEnvelope) -> Result<(), RelayError> {
        let sms = decoded.sms()?;
        self.deliver(&decoded.id, sms).await?;
        Ok(())
    }

    /// Single-message entry point: push envelope or direct payload, exactly one sink call
    pub async fn send_envelope(&self, envelope: &Value) -> Result<(), RelayError> {
        let decoded = decode_envelope(envelope)?;
        self.deliver_decoded(decoded).await
    }

    /// Deliver a message pulled from a subscription
    pub async fn deliver_inbound(&self, message: &InboundMessage) -> Result<(), RelayError> {
        let decoded = decode_inbound(message)?;
        self.deliver_decoded(decoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<SmsMessage>>,
    }

    #[async_trait]
    impl SmsSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, message: &SmsMessage) -> Result<(), SinkError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_override_reroutes_destination() {
        let sink = Arc::new(RecordingSink::default());
        let relay = Relay::new(sink.clone()).with_override_to(Some("+15550000000".into()));
        relay
            .send_envelope(&serde_json::json!({"type": "x", "to": "+15551234567", "body": "hi"}))
            .await
            .unwrap();
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[SmsMessage::new("+15550000000", "hi")]);
    }

    #[tokio::test]
    async fn test_blank_override_ignored() {
        let sink = Arc::new(RecordingSink::default());
        let relay = Relay::new(sink.clone()).with_override_to(Some("  ".into()));
        relay
            .deliver("m", SmsMessage::new("+1555", "b"))
            .await
            .unwrap();
        assert_eq!(sink.sent.lock().unwrap()[0].to, "+1555");
    }

    #[tokio::test]
    async fn test_format_error_skips_sink() {
        let sink = Arc::new(RecordingSink::default());
        let relay = Relay::new(sink.clone());
        let err = relay
            .send_envelope(&serde_json::json!({"nothing": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Format(_)));
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
