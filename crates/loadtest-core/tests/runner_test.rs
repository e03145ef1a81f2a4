//! Pacing, backpressure and autoscaling against a live HTTP server

mod common;

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use common::{drain, ok_server, slow_server, status_server};
use loadtest_core::{LoadTestArgs, Runner};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_qps() {
    let target = ok_server().await;
    let runner = Runner::new(
        target,
        LoadTestArgs {
            duration: Duration::from_secs(1),
            qps: 100,
            workers: 1,
            autoscale: false,
            ..Default::default()
        },
    )
    .unwrap();

    let (results, _) = drain(runner.start()).await;

    let hits = results.len();
    assert!((95..=101).contains(&hits), "hits = {}", hits);
    assert!(results.iter().all(|r| r.success && r.code == 200 && r.error.is_empty()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duration() {
    let target = ok_server().await;
    let runner = Runner::new(
        target,
        LoadTestArgs {
            duration: Duration::from_secs(1),
            qps: 100,
            workers: 1,
            autoscale: false,
            ..Default::default()
        },
    )
    .unwrap();

    let start = Instant::now();
    drain(runner.start()).await;
    let elapsed = start.elapsed();

    assert!(
        elapsed >= Duration::from_secs(1) && elapsed < Duration::from_millis(1_500),
        "elapsed = {:?}",
        elapsed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sequence_numbers_are_gapless_and_timestamps_ordered() {
    let target = ok_server().await;
    let runner = Runner::new(
        target,
        LoadTestArgs {
            duration: Duration::from_millis(500),
            qps: 200,
            workers: 4,
            max_workers: 8,
            autoscale: true,
            ..Default::default()
        },
    )
    .unwrap();

    let (mut results, _) = drain(runner.start()).await;
    assert!(!results.is_empty());

    results.sort_by_key(|r| r.seq);
    for (expected, result) in results.iter().enumerate() {
        assert_eq!(result.seq, expected as u64);
    }
    for pair in results.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backpressure_without_autoscale() {
    let target = slow_server(Duration::from_millis(50)).await;
    let runner = Runner::new(
        target,
        LoadTestArgs {
            duration: Duration::from_secs(1),
            qps: 100,
            workers: 1,
            max_workers: 1,
            autoscale: false,
            ..Default::default()
        },
    )
    .unwrap();

    let (results, worker_counts) = drain(runner.start()).await;

    // One worker at 50ms per request completes about 20 in a second.
    assert!(results.len() <= 25, "completed = {}", results.len());
    assert!(results.len() >= 10, "completed = {}", results.len());
    assert!(results.iter().all(|r| r.success));
    assert!(worker_counts.iter().all(|&count| count <= 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_autoscale_grows_within_bounds() {
    let target = slow_server(Duration::from_millis(100)).await;
    let runner = Runner::new(
        target,
        LoadTestArgs {
            duration: Duration::from_secs(1),
            qps: 100,
            workers: 1,
            max_workers: 5,
            autoscale: true,
            ..Default::default()
        },
    )
    .unwrap();

    let (results, worker_counts) = drain(runner.start()).await;

    let last = *worker_counts.last().unwrap();
    assert!(last > 1, "worker count never grew");
    assert!(last <= 5, "worker count {} above max", last);
    assert!(worker_counts.windows(2).all(|pair| pair[0] <= pair[1]));

    // Five workers at 100ms each beat a single worker's ~10/s.
    assert!(results.len() > 15, "completed = {}", results.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_application_failure_keeps_status() {
    let target = status_server(StatusCode::SERVICE_UNAVAILABLE).await;
    let runner = Runner::new(
        target,
        LoadTestArgs {
            duration: Duration::from_millis(300),
            qps: 20,
            workers: 1,
            autoscale: false,
            ..Default::default()
        },
    )
    .unwrap();

    let (results, _) = drain(runner.start()).await;

    assert!(!results.is_empty());
    for result in &results {
        assert!(!result.success);
        assert_eq!(result.code, 503);
        assert_eq!(result.error, "503 Service Unavailable");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_is_a_transport_failure() {
    let target = slow_server(Duration::from_millis(500)).await;
    let runner = Runner::new(
        target,
        LoadTestArgs {
            duration: Duration::from_millis(300),
            qps: 10,
            workers: 2,
            autoscale: false,
            timeout: Duration::from_millis(100),
            ..Default::default()
        },
    )
    .unwrap();

    let (results, _) = drain(runner.start()).await;

    assert!(!results.is_empty());
    for result in &results {
        assert!(!result.success);
        assert_eq!(result.code, 0);
        assert!(!result.error.is_empty());
        assert!(result.latency >= Duration::from_millis(100));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repeated_short_autoscaling_runs_always_drain() {
    let target = ok_server().await;

    for round in 0..200 {
        let runner = Runner::new(
            target.clone(),
            LoadTestArgs {
                duration: Duration::from_millis(20),
                qps: 5_000,
                workers: 2,
                max_workers: 64,
                autoscale: true,
                ..Default::default()
            },
        )
        .unwrap();

        let (mut results, worker_counts) =
            tokio::time::timeout(Duration::from_secs(5), drain(runner.start()))
                .await
                .unwrap_or_else(|_| panic!("run {} did not drain", round));

        assert!(*worker_counts.last().unwrap() <= 64);
        results.sort_by_key(|r| r.seq);
        for (expected, result) in results.iter().enumerate() {
            assert_eq!(result.seq, expected as u64);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repeated_stops_always_drain() {
    let target = ok_server().await;

    for round in 0..100 {
        let runner = Runner::new(
            target.clone(),
            LoadTestArgs {
                duration: Duration::ZERO,
                qps: 5_000,
                workers: 2,
                max_workers: 64,
                autoscale: true,
                ..Default::default()
            },
        )
        .unwrap();

        let results = runner.start();
        tokio::time::sleep(Duration::from_millis(5 + round % 10)).await;
        assert!(runner.stop());

        tokio::time::timeout(Duration::from_secs(5), drain(results))
            .await
            .unwrap_or_else(|_| panic!("run {} did not drain after stop", round));
    }
}
