//! Inbound envelope decoding
//!
//! Two shapes are accepted: a push envelope carrying a base64 JSON `data`
//! field, and a direct payload identified by its `type` field. A field only
//! counts when it holds a value (not null, false, 0 or an empty string). Pulled
//! subscription messages carry the JSON payload as raw bytes.

mod decode;

pub use decode::{
    decode_envelope, decode_inbound, DecodedEnvelope, EnvelopeError, DIRECT_PAYLOAD_ID_PREFIX,
};
