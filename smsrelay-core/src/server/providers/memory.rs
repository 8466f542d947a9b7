//! In-process message source: a channel-backed feed for local drains and tests.

use crate::models::InboundMessage;
use crate::server::providers::{MessageSource, SourceError, SourceEvent, SourceFactory};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const FEED_CAPACITY: usize = 1024;

/// In-memory feed. Messages pushed before `attach` are buffered and delivered first.
pub struct MemorySource {
    name: String,
    tx: Mutex<Option<mpsc::Sender<SourceEvent>>>,
    rx: Mutex<Option<mpsc::Receiver<SourceEvent>>>,
    attached: AtomicBool,
    detach_calls: AtomicUsize,
    acked: Mutex<Vec<String>>,
    failing_acks: Mutex<HashSet<String>>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        Self {
            name: name.into(),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            attached: AtomicBool::new(false),
            detach_calls: AtomicUsize::new(0),
            acked: Mutex::new(Vec::new()),
            failing_acks: Mutex::new(HashSet::new()),
        }
    }

    /// Create a feed preloaded with messages
    pub fn with_messages(name: impl Into<String>, messages: Vec<InboundMessage>) -> Self {
        let source = Self::new(name);
        for message in messages {
            source.push(message);
        }
        source
    }

    fn sender(&self) -> Option<mpsc::Sender<SourceEvent>> {
        self.tx.lock().ok().and_then(|guard| guard.clone())
    }

    /// Queue a message for delivery. Returns false once the feed is detached or full.
    pub fn push(&self, message: InboundMessage) -> bool {
        self.sender()
            .map(|tx| tx.try_send(SourceEvent::Message(message)).is_ok())
            .unwrap_or(false)
    }

    /// Queue a terminal stream error
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.sender()
            .map(|tx| tx.try_send(SourceEvent::Error(reason.into())).is_ok())
            .unwrap_or(false)
    }

    /// Close the feed without an error once buffered messages are consumed
    pub fn close(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }

    /// Make acknowledgment of the given message id fail
    pub fn fail_ack_for(&self, message_id: impl Into<String>) {
        if let Ok(mut guard) = self.failing_acks.lock() {
            guard.insert(message_id.into());
        }
    }

    /// Ids acknowledged so far, in acknowledgment order
    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// How many times `detach` was called
    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attach(&self) -> Result<mpsc::Receiver<SourceEvent>, SourceError> {
        let rx = self.rx.lock().ok().and_then(|mut guard| guard.take());
        match rx {
            Some(rx) => {
                self.attached.store(true, Ordering::SeqCst);
                Ok(rx)
            }
            None => Err(SourceError::AlreadyAttached(self.name.clone())),
        }
    }

    async fn detach(&self) {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        if self.attached.swap(false, Ordering::SeqCst) {
            self.close();
        }
    }

    async fn acknowledge(&self, message: &InboundMessage) -> Result<(), SourceError> {
        let failing = self
            .failing_acks
            .lock()
            .map(|g| g.contains(&message.id))
            .unwrap_or(false);
        if failing {
            return Err(SourceError::Ack {
                message_id: message.id.clone(),
                reason: "acknowledgment rejected".to_string(),
            });
        }
        if let Ok(mut guard) = self.acked.lock() {
            guard.push(message.ack_id.clone());
        }
        Ok(())
    }
}

/// Factory handing out pre-registered in-memory sources by subscription name
#[derive(Default)]
pub struct MemorySourceFactory {
    sources: Mutex<Vec<Arc<MemorySource>>>,
}

impl MemorySourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source: Arc<MemorySource>) {
        if let Ok(mut guard) = self.sources.lock() {
            guard.push(source);
        }
    }
}

#[async_trait]
impl SourceFactory for MemorySourceFactory {
    async fn open(
        &self,
        subscription: &str,
        _intake_limit: usize,
    ) -> Result<Arc<dyn MessageSource>, SourceError> {
        let found = self
            .sources
            .lock()
            .ok()
            .and_then(|g| g.iter().find(|s| s.name() == subscription).cloned());
        match found {
            Some(source) => Ok(source),
            None => Err(SourceError::Open(
                subscription.to_string(),
                "no such subscription".to_string(),
            )),
        }
    }
}
