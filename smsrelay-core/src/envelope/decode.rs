use crate::models::{InboundMessage, SmsMessage};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

/// Prefix of identifiers synthesized for direct payloads that carry none
pub const DIRECT_PAYLOAD_ID_PREFIX: &str = "DirectPayload-";

/// Envelope format errors. Fatal to the message, never retried.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("No message received or message format is invalid")]
    Missing,

    #[error("Invalid message format: message must have 'data' or 'type'")]
    UnrecognizedShape,

    #[error("Message data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Message data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message data is not an object")]
    NotAnObject,

    #[error("Message object must include a '{0}' property with a non-empty string value")]
    MissingField(&'static str),
}

/// Envelope after decoding: an identifier for logging plus the JSON payload
#[derive(Debug, Clone)]
pub struct DecodedEnvelope {
    pub id: String,
    pub payload: Value,
}

impl DecodedEnvelope {
    /// Extract the outbound SMS carried by this payload
    pub fn sms(&self) -> Result<SmsMessage, EnvelopeError> {
        SmsMessage::from_payload(&self.payload)
    }
}

/// Decode a push envelope or a direct payload.
///
/// A push-endpoint wrapper (`{"message": {...}, "subscription": "..."}`) is
/// unwrapped before the shape is inspected.
pub fn decode_envelope(envelope: &Value) -> Result<DecodedEnvelope, EnvelopeError> {
    let object = envelope.as_object().ok_or(EnvelopeError::Missing)?;

    let object = match object.get("message").and_then(Value::as_object) {
        Some(inner) if has_value(inner, "data") => inner,
        _ => object,
    };

    if has_value(object, "data") {
        let id = string_field(object, "messageId")
            .or_else(|| string_field(object, "id"))
            .unwrap_or_default();
        tracing::info!(message_id = %id, "Processing message as push envelope");

        let encoded = object
            .get("data")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::UnrecognizedShape)?;
        let bytes = BASE64_STANDARD.decode(encoded.trim())?;
        tracing::debug!(message_id = %id, data_len = bytes.len(), "Decoded push data");
        let payload: Value = serde_json::from_slice(&bytes)?;

        return Ok(DecodedEnvelope { id, payload });
    }

    if has_value(object, "type") {
        let id = string_field(object, "id").unwrap_or_else(|| {
            format!(
                "{}{}",
                DIRECT_PAYLOAD_ID_PREFIX,
                chrono::Utc::now().timestamp_millis()
            )
        });
        tracing::info!(message_id = %id, "Processing direct payload without push envelope");

        return Ok(DecodedEnvelope {
            id,
            payload: Value::Object(object.clone()),
        });
    }

    Err(EnvelopeError::UnrecognizedShape)
}

/// Decode the JSON payload of a pulled message
pub fn decode_inbound(message: &InboundMessage) -> Result<DecodedEnvelope, EnvelopeError> {
    let payload: Value = serde_json::from_slice(&message.data)?;
    Ok(DecodedEnvelope {
        id: message.id.clone(),
        payload,
    })
}

/// True when `key` holds a value: absent, null, false, zero and "" all count as unset.
fn has_value(object: &serde_json::Map<String, Value>, key: &str) -> bool {
    match object.get(key) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

fn string_field(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl SmsMessage {
    /// Build an SMS from a decoded payload; `to` and `body` must be non-empty strings.
    /// Whitespace is kept as-is; the sink decides whether a destination is dialable.
    pub fn from_payload(payload: &Value) -> Result<Self, EnvelopeError> {
        let object = payload.as_object().ok_or(EnvelopeError::NotAnObject)?;
        let field = |name: &'static str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or(EnvelopeError::MissingField(name))
        };
        Ok(SmsMessage {
            to: field("to")?,
            body: field("body")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // {"to": "469-222-2005", "body": "You rock!"}
    const PUSH_DATA: &str =
        "ewogICJ0byI6ICI0NjktMjIyLTIwMDUiLAogICJib2R5IjogIllvdSByb2NrISIKfQ==";

    #[test]
    fn test_push_envelope() {
        let decoded = decode_envelope(&json!({"data": PUSH_DATA, "messageId": "42"})).unwrap();
        assert_eq!(decoded.id, "42");
        let sms = decoded.sms().unwrap();
        assert_eq!(sms.to, "469-222-2005");
        assert_eq!(sms.body, "You rock!");
    }

    #[test]
    fn test_push_wrapper_is_unwrapped() {
        let envelope = json!({
            "message": {"data": PUSH_DATA, "id": "7"},
            "subscription": "projects/p/subscriptions/s"
        });
        let decoded = decode_envelope(&envelope).unwrap();
        assert_eq!(decoded.id, "7");
        assert_eq!(decoded.sms().unwrap().body, "You rock!");
    }

    #[test]
    fn test_direct_payload_synthesizes_id() {
        let decoded =
            decode_envelope(&json!({"type": "x", "to": "+15551234567", "body": "hi"})).unwrap();
        assert!(decoded.id.starts_with(DIRECT_PAYLOAD_ID_PREFIX));
        assert_eq!(
            decoded.sms().unwrap(),
            SmsMessage::new("+15551234567", "hi")
        );
    }

    #[test]
    fn test_direct_payload_keeps_id() {
        let decoded = decode_envelope(&json!({"type": "x", "id": "abc"})).unwrap();
        assert_eq!(decoded.id, "abc");
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert!(matches!(
            decode_envelope(&json!({"to": "1", "body": "b"})),
            Err(EnvelopeError::UnrecognizedShape)
        ));
        assert!(matches!(
            decode_envelope(&Value::Null),
            Err(EnvelopeError::Missing)
        ));
        assert!(matches!(
            decode_envelope(&json!("text")),
            Err(EnvelopeError::Missing)
        ));
    }

    #[test]
    fn test_unset_data_falls_through_to_direct() {
        let direct = json!({"data": null, "type": "x", "to": "+15551234567", "body": "hi"});
        let decoded = decode_envelope(&direct).unwrap();
        assert!(decoded.id.starts_with(DIRECT_PAYLOAD_ID_PREFIX));
        assert_eq!(decoded.sms().unwrap().body, "hi");

        let direct = json!({"data": "", "type": "x", "id": "d-1", "to": "+1", "body": "hi"});
        let decoded = decode_envelope(&direct).unwrap();
        assert_eq!(decoded.id, "d-1");
        assert_eq!(decoded.payload["data"], "");
    }

    #[test]
    fn test_unset_type_is_unrecognized() {
        for envelope in [
            json!({"type": null, "to": "+1", "body": "hi"}),
            json!({"type": "", "to": "+1", "body": "hi"}),
            json!({"type": false, "to": "+1", "body": "hi"}),
            json!({"data": null, "type": 0}),
        ] {
            assert!(
                matches!(decode_envelope(&envelope), Err(EnvelopeError::UnrecognizedShape)),
                "{envelope} should be rejected"
            );
        }
    }

    #[test]
    fn test_wrapper_without_data_is_not_unwrapped() {
        let envelope = json!({"message": {"data": ""}, "type": "x", "id": "outer"});
        let decoded = decode_envelope(&envelope).unwrap();
        assert_eq!(decoded.id, "outer");
    }

    #[test]
    fn test_non_string_data_is_rejected() {
        assert!(matches!(
            decode_envelope(&json!({"data": 5, "type": "x"})),
            Err(EnvelopeError::UnrecognizedShape)
        ));
    }

    #[test]
    fn test_bad_push_data() {
        assert!(matches!(
            decode_envelope(&json!({"data": "%%%"})),
            Err(EnvelopeError::Base64(_))
        ));
        // "bm90IGpzb24=" is "not json"
        assert!(matches!(
            decode_envelope(&json!({"data": "bm90IGpzb24="})),
            Err(EnvelopeError::Json(_))
        ));
    }

    #[test]
    fn test_sms_requires_fields() {
        assert!(matches!(
            SmsMessage::from_payload(&json!({"body": "b"})),
            Err(EnvelopeError::MissingField("to"))
        ));
        assert!(matches!(
            SmsMessage::from_payload(&json!({"to": "1", "body": ""})),
            Err(EnvelopeError::MissingField("body"))
        ));
        assert!(matches!(
            SmsMessage::from_payload(&json!({"to": "1", "body": 7})),
            Err(EnvelopeError::MissingField("body"))
        ));
        assert!(matches!(
            SmsMessage::from_payload(&json!([1, 2])),
            Err(EnvelopeError::NotAnObject)
        ));
    }

    #[test]
    fn test_whitespace_fields_are_values() {
        let sms = SmsMessage::from_payload(&json!({"to": "+1", "body": " "})).unwrap();
        assert_eq!(sms.body, " ");
        let sms = SmsMessage::from_payload(&json!({"to": " ", "body": "b"})).unwrap();
        assert_eq!(sms.to, " ");
    }

    #[test]
    fn test_decode_inbound() {
        let message = InboundMessage::new("m-9", &br#"{"to": "+1", "body": "x"}"#[..]);
        let decoded = decode_inbound(&message).unwrap();
        assert_eq!(decoded.id, "m-9");
        assert_eq!(decoded.sms().unwrap().body, "x");
    }
}
