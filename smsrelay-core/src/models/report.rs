//! Drain session configuration, requests and reports

use crate::models::DrainDefaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid drain options
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DrainConfigError {
    #[error("maxMessages must be a positive integer")]
    ZeroQuota,

    #[error("windowDuration must be a positive number of seconds")]
    ZeroWindow,
}

/// Immutable options for one drain session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainConfig {
    max_messages: usize,
    window: Duration,
    always_ack: bool,
}

impl DrainConfig {
    pub fn new(
        max_messages: usize,
        window: Duration,
        always_ack: bool,
    ) -> Result<Self, DrainConfigError> {
        if max_messages == 0 {
            return Err(DrainConfigError::ZeroQuota);
        }
        if window.is_zero() {
            return Err(DrainConfigError::ZeroWindow);
        }
        Ok(Self {
            max_messages,
            window,
            always_ack,
        })
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn always_ack(&self) -> bool {
        self.always_ack
    }
}

/// Drain request as received over HTTP or assembled by the CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainRequest {
    pub subscription_name: Option<String>,
    /// Listening window in seconds
    pub window_duration: Option<u64>,
    pub max_messages: Option<usize>,
    pub always_ack: Option<bool>,
}

impl DrainRequest {
    /// Subscription to drain: the request's, else the configured default
    pub fn subscription<'a>(&'a self, defaults: &'a DrainDefaults) -> Option<&'a str> {
        self.subscription_name
            .as_deref()
            .or(defaults.subscription_name.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Resolve session options, filling omitted fields from defaults
    pub fn to_config(&self, defaults: &DrainDefaults) -> Result<DrainConfig, DrainConfigError> {
        DrainConfig::new(
            self.max_messages.unwrap_or(defaults.max_messages),
            Duration::from_secs(self.window_duration.unwrap_or(defaults.window_seconds)),
            self.always_ack.unwrap_or(defaults.always_ack),
        )
    }
}

/// Summary of one drain session, produced exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionReport {
    /// Messages admitted (sequence numbers within quota)
    pub pulled: usize,
    /// Admitted messages whose processing finished
    pub processed: usize,
    /// Messages the sink delivered
    pub succeeded: usize,
    /// Messages acknowledged back to the source
    pub acknowledged: usize,
}
