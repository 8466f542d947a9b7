//! Message data structures

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A message pulled from a subscription feed.
///
/// Owned by the source until acknowledged; `ack_id` is the handle the source
/// needs to release it.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Provider-assigned message identifier
    pub id: String,
    /// Opaque acknowledgment handle
    pub ack_id: String,
    /// Raw payload bytes (already transport-decoded)
    pub data: Bytes,
    /// Message attributes carried alongside the payload
    pub attributes: HashMap<String, String>,
    /// Publish time reported by the source, if any
    pub publish_time: Option<DateTime<Utc>>,
}

impl InboundMessage {
    /// Create a message whose ack handle is its id
    pub fn new(id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let id = id.into();
        Self {
            ack_id: id.clone(),
            id,
            data: data.into(),
            attributes: HashMap::new(),
            publish_time: None,
        }
    }

    /// Create a message with a random id, as for locally produced payloads
    pub fn with_random_id(data: impl Into<Bytes>) -> Self {
        Self::new(Uuid::new_v4().to_string(), data)
    }
}

/// Normalized outbound SMS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    /// Destination address
    pub to: String,
    /// Text body
    pub body: String,
}

impl SmsMessage {
    pub fn new(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            body: body.into(),
        }
    }

    /// Replace the destination, keeping the body
    pub fn routed_to(self, to: &str) -> Self {
        Self {
            to: to.to_string(),
            body: self.body,
        }
    }
}
