//! Integration tests: bounded drain sessions against an in-memory feed.

mod common;

use common::{messages, MockSink};
use smsrelay_core::drain::{DrainCoordinator, DrainError};
use smsrelay_core::models::{DrainConfig, InboundMessage, SessionReport};
use smsrelay_core::server::providers::{MemorySource, MemorySourceFactory, MessageSource};
use smsrelay_core::services::Relay;
use std::sync::Arc;
use std::time::Duration;

fn coordinator(sink: &Arc<MockSink>) -> DrainCoordinator {
    DrainCoordinator::new(Relay::new(sink.clone()))
}

fn config(max_messages: usize, window_ms: u64, always_ack: bool) -> DrainConfig {
    DrainConfig::new(max_messages, Duration::from_millis(window_ms), always_ack).unwrap()
}

fn assert_ordered(report: &SessionReport, max_messages: usize) {
    assert!(report.acknowledged <= report.processed);
    assert!(report.processed <= report.pulled);
    assert!(report.pulled <= max_messages);
}

#[tokio::test]
async fn test_quota_caps_concurrent_arrivals() {
    let sink = Arc::new(MockSink::new(Duration::from_millis(50), false));
    let source = Arc::new(MemorySource::with_messages("sms-pull", messages(5)));

    let report = coordinator(&sink)
        .run_session(source.clone(), &config(3, 5_000, true))
        .await
        .unwrap();

    assert_eq!(
        report,
        SessionReport {
            pulled: 3,
            processed: 3,
            succeeded: 3,
            acknowledged: 3
        }
    );
    assert_eq!(sink.calls(), 3);
    let mut acked = source.acked();
    acked.sort();
    assert_eq!(acked, vec!["m-1", "m-2", "m-3"]);
    assert!(!source.is_attached());
}

#[tokio::test]
async fn test_window_elapses_without_messages() {
    let sink = Arc::new(MockSink::succeeding());
    let source = Arc::new(MemorySource::new("quiet-sub"));

    let report = coordinator(&sink)
        .run_session(source.clone(), &config(10, 50, true))
        .await
        .unwrap();

    assert_eq!(report, SessionReport::default());
    assert_eq!(sink.calls(), 0);
    assert_eq!(source.detach_calls(), 1);
}

#[tokio::test]
async fn test_failures_unacknowledged_without_always_ack() {
    let sink = Arc::new(MockSink::failing());
    let source = Arc::new(MemorySource::with_messages("sms-pull", messages(5)));

    let report = coordinator(&sink)
        .run_session(source.clone(), &config(3, 5_000, false))
        .await
        .unwrap();

    assert_eq!(report.pulled, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.acknowledged, 0);
    assert!(source.acked().is_empty());
}

#[tokio::test]
async fn test_failures_acknowledged_with_always_ack() {
    let sink = Arc::new(MockSink::failing());
    let source = Arc::new(MemorySource::with_messages("sms-pull", messages(5)));

    let report = coordinator(&sink)
        .run_session(source.clone(), &config(3, 5_000, true))
        .await
        .unwrap();

    assert_eq!(report.pulled, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.acknowledged, 3);
    assert_eq!(report.succeeded, 0);
}

#[tokio::test]
async fn test_stream_error_waits_for_admitted_work() {
    let sink = Arc::new(MockSink::new(Duration::from_millis(100), false));
    let source = Arc::new(MemorySource::with_messages("sms-pull", messages(2)));
    source.fail("subscription deleted");

    let result = coordinator(&sink)
        .run_session(source.clone(), &config(10, 5_000, true))
        .await;

    match result {
        Err(DrainError::Stream(reason)) => assert_eq!(reason, "subscription deleted"),
        other => panic!("expected stream error, got {:?}", other),
    }
    assert_eq!(sink.calls(), 2);
    assert_eq!(sink.completed(), 2, "admitted sends settle before the failure");
    assert_eq!(source.acked().len(), 2);
}

#[tokio::test]
async fn test_window_expiry_awaits_in_flight_dispatch() {
    let sink = Arc::new(MockSink::new(Duration::from_millis(200), false));
    let source = Arc::new(MemorySource::with_messages("sms-pull", messages(1)));

    let report = coordinator(&sink)
        .run_session(source.clone(), &config(10, 50, true))
        .await
        .unwrap();

    assert_eq!(
        report,
        SessionReport {
            pulled: 1,
            processed: 1,
            succeeded: 1,
            acknowledged: 1
        }
    );
}

#[tokio::test]
async fn test_closed_feed_finalizes_early() {
    let sink = Arc::new(MockSink::succeeding());
    let source = Arc::new(MemorySource::with_messages("sms-pull", messages(2)));
    source.close();

    let started = std::time::Instant::now();
    let report = coordinator(&sink)
        .run_session(source.clone(), &config(10, 10_000, true))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.pulled, 2);
    assert_eq!(report.succeeded, 2);
}

#[tokio::test]
async fn test_ack_failure_is_not_fatal() {
    let sink = Arc::new(MockSink::succeeding());
    let source = Arc::new(MemorySource::with_messages("sms-pull", messages(3)));
    source.fail_ack_for("m-2");

    let report = coordinator(&sink)
        .run_session(source.clone(), &config(3, 5_000, true))
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.acknowledged, 2);
}

#[tokio::test]
async fn test_malformed_payload_counts_as_failure() {
    let sink = Arc::new(MockSink::succeeding());
    let source = Arc::new(MemorySource::with_messages(
        "sms-pull",
        vec![
            InboundMessage::new("bad", &b"not json"[..]),
            InboundMessage::new("no-body", &br#"{"to": "+15551234567"}"#[..]),
        ],
    ));
    source.close();

    let report = coordinator(&sink)
        .run_session(source.clone(), &config(10, 5_000, false))
        .await
        .unwrap();

    assert_eq!(report.pulled, 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.acknowledged, 0);
    assert_eq!(sink.calls(), 0);
}

#[tokio::test]
async fn test_second_session_on_attached_feed_fails() {
    let sink = Arc::new(MockSink::succeeding());
    let source = Arc::new(MemorySource::new("sms-pull"));
    let _rx = source.attach().await.unwrap();

    let result = coordinator(&sink)
        .run_session(source.clone(), &config(1, 50, true))
        .await;

    assert!(matches!(result, Err(DrainError::Source(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_respect_quota() {
    let sink = Arc::new(MockSink::new(Duration::from_millis(5), false));
    let source = Arc::new(MemorySource::new("busy-sub"));

    let producers: Vec<_> = (0..5)
        .map(|p| {
            let source = Arc::clone(&source);
            tokio::spawn(async move {
                for i in 0..10 {
                    source.push(InboundMessage::new(
                        format!("p{}-{}", p, i),
                        common::PAYLOAD.as_bytes().to_vec(),
                    ));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let report = coordinator(&sink)
        .run_session(source.clone(), &config(20, 5_000, true))
        .await
        .unwrap();
    for producer in producers {
        producer.await.unwrap();
    }

    assert_ordered(&report, 20);
    assert_eq!(report.pulled, 20);
    assert_eq!(report.processed, 20);
    assert_eq!(sink.calls(), 20);
    assert_eq!(source.acked().len(), 20);
}

#[tokio::test]
async fn test_drain_opens_subscription_through_factory() {
    let sink = Arc::new(MockSink::succeeding());
    let factory = MemorySourceFactory::new();
    let source = Arc::new(MemorySource::with_messages("sms-pull", messages(2)));
    factory.register(source.clone());

    let report = coordinator(&sink)
        .drain(Some(&factory), Some("sms-pull"), &config(2, 5_000, true))
        .await
        .unwrap();
    assert_eq!(report.acknowledged, 2);

    let missing = coordinator(&sink)
        .drain(Some(&factory), Some("missing-sub"), &config(2, 50, true))
        .await;
    assert!(matches!(missing, Err(DrainError::Source(_))));
}

#[tokio::test]
async fn test_drain_without_subscription_or_backend_is_config_error() {
    let sink = Arc::new(MockSink::succeeding());
    let factory = MemorySourceFactory::new();
    let source = Arc::new(MemorySource::with_messages("sms-pull", messages(2)));
    factory.register(source.clone());

    for subscription in [None, Some(""), Some("   ")] {
        let result = coordinator(&sink)
            .drain(Some(&factory), subscription, &config(2, 50, true))
            .await;
        assert!(matches!(result, Err(DrainError::Config(_))));
    }

    let result = coordinator(&sink)
        .drain(None, Some("sms-pull"), &config(2, 50, true))
        .await;
    assert!(matches!(result, Err(DrainError::Config(_))));

    assert!(!source.is_attached());
    assert_eq!(sink.calls(), 0);
}

#[tokio::test]
async fn test_drain_rejects_invalid_subscription_name() {
    let sink = Arc::new(MockSink::succeeding());
    let factory = MemorySourceFactory::new();
    factory.register(Arc::new(MemorySource::with_messages("1 bad", messages(1))));

    let result = coordinator(&sink)
        .drain(Some(&factory), Some("1 bad"), &config(1, 50, true))
        .await;
    assert!(matches!(result, Err(DrainError::InvalidSubscription(_))));
    assert_eq!(sink.calls(), 0);
}
