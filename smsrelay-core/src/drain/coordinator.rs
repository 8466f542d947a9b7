//! Bounded drain coordinator
//!
//! Runs one drain session: attaches to a source, admits up to the quota,
//! dispatches each admitted message to the relay on its own task, and
//! finalizes once on the first of quota reached, window elapsed or stream
//! error. Admitted dispatches always run to completion before the response.

use crate::drain::session::{Admission, DrainSession};
use crate::models::{DrainConfig, InboundMessage, SessionReport};
use crate::server::providers::{MessageSource, SourceError, SourceEvent, SourceFactory};
use crate::services::Relay;
use crate::subscription::validation::{validate_subscription_name, SubscriptionNameError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

/// Session-level failures. Per-message failures only show up in the report counts.
#[derive(Error, Debug)]
pub enum DrainError {
    /// Nothing to drain from; raised before any session starts
    #[error("Server misconfiguration: {0}")]
    Config(String),

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(#[from] SubscriptionNameError),

    #[error("Subscription stream failed: {0}")]
    Stream(String),

    #[error("{0}")]
    Source(#[from] SourceError),
}

/// Which condition ended intake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    QuotaReached,
    WindowElapsed,
    FeedClosed,
    StreamError(String),
}

impl Trigger {
    fn as_str(&self) -> &'static str {
        match self {
            Trigger::QuotaReached => "quota_reached",
            Trigger::WindowElapsed => "window_elapsed",
            Trigger::FeedClosed => "feed_closed",
            Trigger::StreamError(_) => "stream_error",
        }
    }
}

/// Drains subscriptions into the relay
#[derive(Clone)]
pub struct DrainCoordinator {
    relay: Relay,
}

impl DrainCoordinator {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }

    /// Open a subscription through the factory and drain it.
    ///
    /// A missing subscription name or backend is a `Config` error and no
    /// source is opened.
    pub async fn drain(
        &self,
        factory: Option<&dyn SourceFactory>,
        subscription: Option<&str>,
        config: &DrainConfig,
    ) -> Result<SessionReport, DrainError> {
        let subscription = subscription
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DrainError::Config("subscriptionName is required".to_string()))?;
        let factory = factory.ok_or_else(|| {
            DrainError::Config("no subscription backend configured".to_string())
        })?;
        validate_subscription_name(subscription)?;

        let source = factory.open(subscription, config.max_messages()).await?;
        tracing::info!(
            subscription = subscription,
            source = source.name(),
            max_messages = config.max_messages(),
            window_secs = config.window().as_secs_f64(),
            always_ack = config.always_ack(),
            "Starting drain session"
        );
        self.run_session(source, config).await
    }

    /// Run one bounded drain session against `source`
    pub async fn run_session(
        &self,
        source: Arc<dyn MessageSource>,
        config: &DrainConfig,
    ) -> Result<SessionReport, DrainError> {
        let session = Arc::new(DrainSession::new(config.max_messages()));
        let tracker = TaskTracker::new();
        let mut feed = source.attach().await?;

        let mut window = Box::pin(tokio::time::sleep(config.window()));
        let trigger = loop {
            tokio::select! {
                biased;

                _ = &mut window => break Trigger::WindowElapsed,
                event = feed.recv() => match event {
                    Some(SourceEvent::Message(message)) => {
                        if self.admit(message, &session, &source, &tracker, config).await {
                            break Trigger::QuotaReached;
                        }
                    }
                    Some(SourceEvent::Error(reason)) => break Trigger::StreamError(reason),
                    None => break Trigger::FeedClosed,
                },
            }
        };
        // Cancel the timer if it was not the trigger.
        drop(window);

        self.finalize(trigger, &session, &source, feed, tracker, config)
            .await
    }

    /// Admit one arrival. Returns true when it is the quota-triggering message.
    async fn admit(
        &self,
        message: InboundMessage,
        session: &Arc<DrainSession>,
        source: &Arc<dyn MessageSource>,
        tracker: &TaskTracker,
        config: &DrainConfig,
    ) -> bool {
        match session.admit() {
            Admission::Stale { seq } => {
                tracing::debug!(
                    message_id = %message.id,
                    seq = seq,
                    "Message arrived after quota; left for redelivery"
                );
                false
            }
            Admission::Admitted { seq, last } => {
                if last && session.stop_listening() {
                    source.detach().await;
                }
                self.dispatch(seq, message, session, source, tracker, config.always_ack());
                last
            }
        }
    }

    fn dispatch(
        &self,
        seq: usize,
        message: InboundMessage,
        session: &Arc<DrainSession>,
        source: &Arc<dyn MessageSource>,
        tracker: &TaskTracker,
        always_ack: bool,
    ) {
        let relay = self.relay.clone();
        let session = Arc::clone(session);
        let source = Arc::clone(source);
        tracker.spawn(async move {
            let delivered = match relay.deliver_inbound(&message).await {
                Ok(()) => {
                    session.record_success();
                    true
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = %message.id,
                        seq = seq,
                        error = %e,
                        "Message processing failed"
                    );
                    false
                }
            };

            if delivered || always_ack {
                match source.acknowledge(&message).await {
                    Ok(()) => session.record_ack(),
                    Err(e) => tracing::warn!(
                        message_id = %message.id,
                        seq = seq,
                        error = %e,
                        "Acknowledgment failed"
                    ),
                }
            } else {
                tracing::debug!(message_id = %message.id, seq = seq, "Left unacknowledged");
            }

            session.record_processed();
        });
    }

    async fn finalize(
        &self,
        trigger: Trigger,
        session: &Arc<DrainSession>,
        source: &Arc<dyn MessageSource>,
        mut feed: mpsc::Receiver<SourceEvent>,
        tracker: TaskTracker,
        config: &DrainConfig,
    ) -> Result<SessionReport, DrainError> {
        if session.stop_listening() {
            source.detach().await;
        }

        // Anything still buffered arrived after intake closed.
        feed.close();
        let mut unadmitted = 0usize;
        while let Ok(event) = feed.try_recv() {
            if let SourceEvent::Message(message) = event {
                match trigger {
                    Trigger::QuotaReached => {
                        self.admit(message, session, source, &tracker, config).await;
                    }
                    _ => unadmitted += 1,
                }
            }
        }
        if unadmitted > 0 {
            tracing::debug!(count = unadmitted, "Buffered messages left for redelivery");
        }

        tracker.close();
        tracker.wait().await;

        let claimed = session.claim_response();
        debug_assert!(claimed, "drain session finalized twice");

        let report = session.report();
        tracing::info!(
            trigger = trigger.as_str(),
            pulled = report.pulled,
            processed = report.processed,
            succeeded = report.succeeded,
            acknowledged = report.acknowledged,
            "Drain session finished"
        );

        match trigger {
            Trigger::StreamError(reason) => Err(DrainError::Stream(reason)),
            _ => Ok(report),
        }
    }
}
