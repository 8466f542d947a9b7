//! Communication providers: SMS sinks and subscription sources
//!
//! **Sinks** deliver one normalized SMS (`SmsSink`, implemented by `TwilioSink`).
//! **Sources** feed inbound messages to a drain session (`MessageSource`,
//! implemented by `PubSubSource` and the in-process `MemorySource`).

mod memory;
mod pubsub;
mod sink;
mod source;
mod twilio;

pub use memory::{MemorySource, MemorySourceFactory};
pub use pubsub::{PubSubClient, PubSubSource};
pub use sink::{SinkError, SmsSink};
pub use source::{MessageSource, SourceError, SourceEvent, SourceFactory};
pub use twilio::{standardize_phone_number, CredentialsError, TwilioCredentials, TwilioSink};
