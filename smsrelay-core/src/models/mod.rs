//! Data models for smsrelay

pub mod configuration;
pub mod message;
pub mod report;

pub use configuration::*;
pub use message::*;
pub use report::*;
