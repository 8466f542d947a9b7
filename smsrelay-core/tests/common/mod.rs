//! Shared test doubles for drain, relay and route tests.

#![allow(dead_code)]

use async_trait::async_trait;
use smsrelay_core::models::{InboundMessage, SmsMessage};
use smsrelay_core::server::providers::{SinkError, SmsSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const PAYLOAD: &str = r#"{"to": "+15551234567", "body": "Your booking is confirmed"}"#;

/// Mock sink that records calls, optionally sleeping and/or failing.
pub struct MockSink {
    delay: Duration,
    fail: bool,
    started: AtomicUsize,
    completed: AtomicUsize,
    sent: Mutex<Vec<SmsMessage>>,
}

impl MockSink {
    pub fn succeeding() -> Self {
        Self::new(Duration::ZERO, false)
    }

    pub fn failing() -> Self {
        Self::new(Duration::ZERO, true)
    }

    pub fn new(delay: Duration, fail: bool) -> Self {
        Self {
            delay,
            fail,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsSink for MockSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, message: &SmsMessage) -> Result<(), SinkError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent.lock().unwrap().push(message.clone());
        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(SinkError::Rejected("provider rejected the send".into()))
        } else {
            Ok(())
        }
    }
}

/// `count` messages with ids m-1..m-count carrying a valid SMS payload
pub fn messages(count: usize) -> Vec<InboundMessage> {
    (1..=count)
        .map(|i| InboundMessage::new(format!("m-{}", i), PAYLOAD.as_bytes().to_vec()))
        .collect()
}
