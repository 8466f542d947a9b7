//! Pub/Sub provider: pull subscription messages over the REST API and acknowledge them.

use crate::models::{InboundMessage, PubSubSettings};
use crate::server::providers::{MessageSource, SourceError, SourceEvent, SourceFactory};
use crate::subscription::{subscription_path, validate_subscription_name};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const FEED_CAPACITY: usize = 64;
const IDLE_POLL_DELAY: Duration = Duration::from_millis(200);

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: usize,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest<'a> {
    ack_ids: [&'a str; 1],
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<ReceivedMessage>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceivedMessage {
    ack_id: String,
    message: PubsubMessage,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PubsubMessage {
    #[serde(default)]
    data: String,
    message_id: String,
    #[serde(default)]
    publish_time: Option<DateTime<Utc>>,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

impl TryFrom<ReceivedMessage> for InboundMessage {
    type Error = base64::DecodeError;

    fn try_from(received: ReceivedMessage) -> Result<Self, Self::Error> {
        let data = BASE64_STANDARD.decode(received.message.data.as_bytes())?;
        Ok(InboundMessage {
            id: received.message.message_id,
            ack_id: received.ack_id,
            data: data.into(),
            attributes: received.message.attributes,
            publish_time: received.message.publish_time,
        })
    }
}

#[derive(Clone)]
struct RestClient {
    http: Arc<Client>,
    endpoint: String,
    access_token: Option<String>,
}

impl RestClient {
    fn post(&self, path: &str, verb: &str) -> RequestBuilder {
        let url = format!("{}/v1/{}:{}", self.endpoint.trim_end_matches('/'), path, verb);
        let req = self.http.post(url);
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn pull(&self, path: &str, max_messages: usize) -> Result<Vec<ReceivedMessage>, String> {
        let res = self
            .post(path, "pull")
            .json(&PullRequest { max_messages })
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("pull {}: {}", status, body));
        }
        let body: PullResponse = res.json().await.map_err(|e| e.to_string())?;
        Ok(body.received_messages)
    }
}

/// Pub/Sub client; opens one pull feed per subscription.
pub struct PubSubClient {
    rest: RestClient,
    project_id: String,
    batch_size: usize,
}

impl PubSubClient {
    /// Build a client from settings. The access token is read from the configured env var, if set.
    pub fn new(settings: &PubSubSettings) -> Result<Self, SourceError> {
        let project_id = settings.project_id.clone().ok_or_else(|| {
            SourceError::Open(String::new(), "pubsub.project_id is not configured".into())
        })?;
        let access_token = std::env::var(&settings.access_token_env)
            .ok()
            .filter(|t| !t.is_empty());
        Ok(Self {
            rest: RestClient {
                http: Arc::new(Client::new()),
                endpoint: settings.endpoint.clone(),
                access_token,
            },
            project_id,
            batch_size: settings.pull_batch_size,
        })
    }

    /// Open a feed for a subscription (short name or full resource path)
    pub fn subscription(&self, name: &str) -> Result<PubSubSource, SourceError> {
        validate_subscription_name(name)
            .map_err(|e| SourceError::Open(name.to_string(), e.to_string()))?;
        Ok(PubSubSource {
            rest: self.rest.clone(),
            path: subscription_path(&self.project_id, name),
            batch_size: self.batch_size,
            intake_limit: usize::MAX,
            attached: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl SourceFactory for PubSubClient {
    async fn open(
        &self,
        subscription: &str,
        intake_limit: usize,
    ) -> Result<Arc<dyn MessageSource>, SourceError> {
        Ok(Arc::new(
            self.subscription(subscription)?
                .with_intake_limit(intake_limit),
        ))
    }
}

/// Pull feed for one subscription. A background poller forwards messages until detached.
pub struct PubSubSource {
    rest: RestClient,
    path: String,
    batch_size: usize,
    intake_limit: usize,
    attached: AtomicBool,
    cancel: CancellationToken,
}

impl PubSubSource {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cap the total number of messages this feed leases and forwards
    pub fn with_intake_limit(mut self, intake_limit: usize) -> Self {
        self.intake_limit = intake_limit;
        self
    }

    /// Messages requested by the next pull
    fn next_pull_size(batch_size: usize, remaining: usize) -> usize {
        batch_size.min(remaining)
    }

    async fn poll(
        rest: RestClient,
        path: String,
        batch_size: usize,
        intake_limit: usize,
        tx: mpsc::Sender<SourceEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!(subscription = %path, intake_limit, "Starting Pub/Sub pull feed");
        let mut remaining = intake_limit;
        loop {
            if remaining == 0 {
                tracing::debug!(subscription = %path, "Intake limit reached; no further pulls");
                cancel.cancelled().await;
                break;
            }

            let pull_size = Self::next_pull_size(batch_size, remaining);
            let pulled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                pulled = rest.pull(&path, pull_size) => pulled,
            };

            let received = match pulled {
                Ok(received) => received,
                Err(e) => {
                    tracing::error!(subscription = %path, error = %e, "Pub/Sub pull failed");
                    let _ = tx.send(SourceEvent::Error(e)).await;
                    break;
                }
            };

            if received.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_POLL_DELAY) => continue,
                }
            }

            for message in received {
                // Stop forwarding as soon as the consumer detaches; the rest are redelivered.
                if cancel.is_cancelled() {
                    break;
                }
                let ack_id = message.ack_id.clone();
                let event = match InboundMessage::try_from(message) {
                    Ok(message) => SourceEvent::Message(message),
                    Err(e) => {
                        tracing::warn!(ack_id = %ack_id, error = %e, "Dropping undecodable Pub/Sub message");
                        continue;
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
                remaining = remaining.saturating_sub(1);
            }
        }
        tracing::debug!(subscription = %path, "Pub/Sub pull feed stopped");
    }
}

#[async_trait]
impl MessageSource for PubSubSource {
    fn name(&self) -> &str {
        "pubsub"
    }

    async fn attach(&self) -> Result<mpsc::Receiver<SourceEvent>, SourceError> {
        if self.attached.swap(true, Ordering::SeqCst) || self.cancel.is_cancelled() {
            return Err(SourceError::AlreadyAttached(self.path.clone()));
        }
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        tokio::spawn(Self::poll(
            self.rest.clone(),
            self.path.clone(),
            self.batch_size,
            self.intake_limit,
            tx,
            self.cancel.clone(),
        ));
        Ok(rx)
    }

    async fn detach(&self) {
        self.cancel.cancel();
    }

    async fn acknowledge(&self, message: &InboundMessage) -> Result<(), SourceError> {
        let res = self
            .rest
            .post(&self.path, "acknowledge")
            .json(&AcknowledgeRequest {
                ack_ids: [message.ack_id.as_str()],
            })
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SourceError::Ack {
                message_id: message.id.clone(),
                reason: format!("{}: {}", status, body),
            });
        }
        Ok(())
    }
}
