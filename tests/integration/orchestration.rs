//! Async orchestrator tests.
//!
//! These tests verify the tokio orchestrator end to end: verdicts, the
//! concurrency cap, the timeout and cancellation policy, and the event
//! stream.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use sitecheck::checker::PatternChecker;
use sitecheck::config::Config;
use sitecheck::orchestration::{CheckEvent, CheckOrchestrator, OrchestratorConfig};
use sitecheck::{check_websites, Error};

use crate::fixtures::{mixed_urls, sample_websites, ConcurrencyProbe, SlowChecker, BROKEN_URL};

/// Test: Default orchestrator matches the sample expectations
#[tokio::test]
async fn test_sample_websites() {
    let orch = CheckOrchestrator::new(Arc::new(PatternChecker::new()), OrchestratorConfig::default());
    let websites = sample_websites();

    let report = orch.run(websites.as_slice()).await.unwrap();

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.failed(), vec![BROKEN_URL]);
    assert_eq!(report.evaluations, 3);
}

/// Test: Concurrency cap
/// Given 8 slow URLs and a cap of 2
/// When the orchestrator runs
/// Then no more than 2 checks are ever in flight
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_max_concurrent_is_respected() {
    let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(30)));
    let config = OrchestratorConfig {
        timeout: None,
        max_concurrent: Some(2),
    };
    let orch = CheckOrchestrator::new(Arc::clone(&probe), config);
    let urls = mixed_urls(8);

    let report = orch.run(urls.as_slice()).await.unwrap();

    assert_eq!(report.results.len(), 8);
    assert_eq!(probe.calls(), 8);
    assert!(probe.peak() <= 2, "peak in-flight was {}", probe.peak());
    assert!(probe.peak() >= 1);
}

/// Test: Uncapped run dispatches everything at once
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_uncapped_run_overlaps_all_checks() {
    let probe = Arc::new(ConcurrencyProbe::new(Duration::from_millis(200)));
    let orch = CheckOrchestrator::new(Arc::clone(&probe), OrchestratorConfig::default());
    let urls = mixed_urls(10);

    orch.run(urls.as_slice()).await.unwrap();

    assert_eq!(probe.peak(), 10);
}

/// Test: Timeout policy
/// Given a checker slower than the timeout
/// When the orchestrator runs
/// Then it returns Timeout without waiting for the checker
#[tokio::test]
async fn test_timeout_abandons_run() {
    let config = OrchestratorConfig {
        timeout: Some(Duration::from_millis(50)),
        max_concurrent: None,
    };
    let orch = CheckOrchestrator::new(Arc::new(SlowChecker::new(Duration::from_millis(400))), config);

    let start = Instant::now();
    let result = orch.run(&["http://slow.example", "http://slower.example"]).await;

    assert!(matches!(result, Err(Error::Timeout(_))));
    assert!(start.elapsed() < Duration::from_millis(400));
}

/// Test: Timeout that is long enough changes nothing
#[tokio::test]
async fn test_generous_timeout_completes() {
    let config = OrchestratorConfig {
        timeout: Some(Duration::from_secs(5)),
        max_concurrent: Some(4),
    };
    let orch = CheckOrchestrator::new(Arc::new(SlowChecker::new(Duration::from_millis(10))), config);
    let urls = mixed_urls(6);

    let report = orch.run(urls.as_slice()).await.unwrap();
    assert!(report.all_ok());
}

/// Test: Cancellation stops later runs too
#[tokio::test]
async fn test_cancellation_is_sticky() {
    let orch = CheckOrchestrator::new(
        Arc::new(SlowChecker::new(Duration::from_millis(200))),
        OrchestratorConfig::default(),
    );
    let cancel = orch.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let first = orch.run(&["http://a.example"]).await;
    assert!(matches!(first, Err(Error::Cancelled)));

    let second = orch.run(&["http://b.example"]).await;
    assert!(matches!(second, Err(Error::Cancelled)));
}

/// Test: Events
/// Given three URLs
/// When the orchestrator runs
/// Then every URL is dispatched before the summary and every index reports once
#[tokio::test]
async fn test_event_stream() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orch = CheckOrchestrator::new(Arc::new(PatternChecker::new()), OrchestratorConfig::default())
        .with_events(tx);
    let websites = sample_websites();

    orch.run(websites.as_slice()).await.unwrap();
    drop(orch);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let dispatched: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            CheckEvent::Dispatched { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(dispatched, vec![0, 1, 2]);

    let mut reported: Vec<(usize, bool)> = events
        .iter()
        .filter_map(|e| match e {
            CheckEvent::Reported { index, ok, .. } => Some((*index, *ok)),
            _ => None,
        })
        .collect();
    reported.sort_unstable();
    assert_eq!(reported, vec![(0, true), (1, true), (2, false)]);

    assert_eq!(events.last(), Some(&CheckEvent::AllReported { total: 3 }));
}

/// Test: Config drives both checker and orchestrator
#[tokio::test]
async fn test_config_wiring_matches_sync_path() {
    let mut config = Config::default();
    config.checker.deny.push(r"bad\.example".to_string());
    config.orchestrator.max_concurrent = Some(3);

    let checker = PatternChecker::from_settings(&config.checker).unwrap();
    let urls = mixed_urls(9);
    let expected = check_websites(&checker, urls.as_slice());

    let orch = CheckOrchestrator::new(Arc::new(checker), config.orchestrator_config());
    let report = orch.run(urls.as_slice()).await.unwrap();

    assert_eq!(report.results, expected);
    assert_eq!(report.failed().len(), 3);
}
