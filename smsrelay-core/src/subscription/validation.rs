//! Subscription name validation
//!
//! Mirrors the Pub/Sub resource naming rules so a bad name is rejected before
//! any session is started against it.

use thiserror::Error;

/// Errors that can occur during subscription name validation
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubscriptionNameError {
    #[error("Subscription name is empty")]
    Empty,

    #[error("Subscription name must be between 3 and 255 characters")]
    BadLength,

    #[error("Subscription name must start with a letter")]
    InvalidStart,

    #[error("Subscription name contains invalid characters (only letters, numbers, and - _ . ~ + % allowed)")]
    InvalidCharacters,

    #[error("Subscription name must not start with 'goog': {0}")]
    ReservedPrefix(String),
}

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 255;

/// Validate a short subscription name (the part after `subscriptions/`).
/// Fully qualified `projects/<p>/subscriptions/<name>` paths are checked on their last segment.
pub fn validate_subscription_name(name: &str) -> Result<(), SubscriptionNameError> {
    let short = match name.strip_prefix("projects/") {
        Some(rest) => rest.rsplit('/').next().unwrap_or(rest),
        None => name,
    };

    if short.is_empty() {
        return Err(SubscriptionNameError::Empty);
    }

    if short.len() < MIN_LEN || short.len() > MAX_LEN {
        return Err(SubscriptionNameError::BadLength);
    }

    if !short.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(SubscriptionNameError::InvalidStart);
    }

    if short.to_ascii_lowercase().starts_with("goog") {
        return Err(SubscriptionNameError::ReservedPrefix(short.to_string()));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '+' | '%');
    if !short.chars().all(allowed) {
        return Err(SubscriptionNameError::InvalidCharacters);
    }

    Ok(())
}
