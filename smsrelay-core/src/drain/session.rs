//! Per-session bookkeeping for a drain.
//!
//! Every counter and flag is an atomic. Sequence numbers come from a single
//! `fetch_add`, the listening flag is cleared with `swap`, and the response
//! flag with a compare-and-swap, so each transition has exactly one winner.

use crate::models::SessionReport;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Outcome of assigning a sequence number to an arriving message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Within quota; `last` marks the message that reaches it
    Admitted { seq: usize, last: bool },
    /// Arrived after the quota was reached; neither processed nor acknowledged
    Stale { seq: usize },
}

/// Mutable state of one drain session
#[derive(Debug)]
pub struct DrainSession {
    max_messages: usize,
    sequence: AtomicUsize,
    processed: AtomicUsize,
    succeeded: AtomicUsize,
    acknowledged: AtomicUsize,
    listening: AtomicBool,
    response_sent: AtomicBool,
}

impl DrainSession {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            sequence: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            acknowledged: AtomicUsize::new(0),
            listening: AtomicBool::new(true),
            response_sent: AtomicBool::new(false),
        }
    }

    /// Assign the next sequence number (first arrival gets 1)
    pub fn admit(&self) -> Admission {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        if seq > self.max_messages {
            Admission::Stale { seq }
        } else {
            Admission::Admitted {
                seq,
                last: seq == self.max_messages,
            }
        }
    }

    /// Clear the listening flag. Returns true only for the caller that cleared it.
    pub fn stop_listening(&self) -> bool {
        self.listening.swap(false, Ordering::SeqCst)
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_ack(&self) {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Claim the right to respond. Exactly one call per session returns true.
    pub fn claim_response(&self) -> bool {
        self.response_sent
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Snapshot the counters. Only meaningful once admitted work has settled.
    pub fn report(&self) -> SessionReport {
        SessionReport {
            pulled: self.sequence.load(Ordering::SeqCst).min(self.max_messages),
            processed: self.processed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            acknowledged: self.acknowledged.load(Ordering::SeqCst),
        }
    }
}
