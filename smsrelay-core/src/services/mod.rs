//! Services shared by the server and the CLI

pub mod logging;
pub mod relay;

pub use relay::{Relay, RelayError};
