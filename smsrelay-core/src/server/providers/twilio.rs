//! Twilio SMS provider: send messages through the Messages API.

use crate::models::SmsMessage;
use crate::server::providers::{SinkError, SmsSink};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01/Accounts";

/// Errors loading provider credentials
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Failed to read credentials from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse credentials JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Credentials file contents. Never log these.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub token: String,
    pub messaging_service_sid: String,
}

impl std::fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("messaging_service_sid", &self.messaging_service_sid)
            .finish_non_exhaustive()
    }
}

impl TwilioCredentials {
    /// Read credentials from a JSON file
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Normalize a phone number: strip `()-` and whitespace, require digits with an
/// optional leading `+`, and assume +1 when no country code is given.
pub fn standardize_phone_number(phone_number: &str) -> Result<String, SinkError> {
    let raw: String = phone_number
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '-') && !c.is_whitespace())
        .collect();

    let digits = raw.strip_prefix('+').unwrap_or(&raw);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SinkError::InvalidNumber(phone_number.to_string()));
    }

    if raw.starts_with('+') {
        Ok(raw)
    } else {
        Ok(format!("+1{}", raw))
    }
}

/// Twilio SMS sink. Constructed once by the caller and shared.
pub struct TwilioSink {
    credentials: TwilioCredentials,
    api_base: String,
    client: Arc<Client>,
}

impl TwilioSink {
    pub fn new(credentials: TwilioCredentials) -> Self {
        Self {
            credentials,
            api_base: TWILIO_API_BASE.to_string(),
            client: Arc::new(Client::new()),
        }
    }

    /// Point the sink at another API base (test servers)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.credentials.account_sid
        )
    }
}

#[async_trait]
impl SmsSink for TwilioSink {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send(&self, message: &SmsMessage) -> Result<(), SinkError> {
        let to = standardize_phone_number(&message.to)?;
        let form = [
            ("Body", message.body.as_str()),
            (
                "MessagingServiceSid",
                self.credentials.messaging_service_sid.as_str(),
            ),
            ("To", to.as_str()),
        ];
        let res = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.token))
            .form(&form)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(SinkError::Provider { status, body });
        }
        tracing::debug!(provider = "twilio", to = %to, "SMS accepted by provider");
        Ok(())
    }
}
