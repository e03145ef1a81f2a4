//! Shared helpers for runner integration tests

#![allow(dead_code)]

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use loadtest_core::{RequestResult, ResultStream};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });

    format!("http://{}/", addr)
}

/// Endpoint answering 200 immediately.
pub async fn ok_server() -> String {
    spawn_server(Router::new().route("/", get(|| async { "ok" }))).await
}

/// Endpoint answering 200 after `delay`.
pub async fn slow_server(delay: Duration) -> String {
    spawn_server(Router::new().route(
        "/",
        get(move || async move {
            tokio::time::sleep(delay).await;
            "slow"
        }),
    ))
    .await
}

/// Endpoint answering with a fixed status code.
pub async fn status_server(status: StatusCode) -> String {
    spawn_server(Router::new().route("/", get(move || async move { status }))).await
}

/// Drain a result stream, recording the worker count after every result.
pub async fn drain(mut results: ResultStream) -> (Vec<RequestResult>, Vec<u64>) {
    let mut collected = Vec::new();
    let mut worker_counts = vec![results.worker_count()];
    while let Some(result) = results.next().await {
        collected.push(result);
        worker_counts.push(results.worker_count());
    }
    worker_counts.push(results.worker_count());
    (collected, worker_counts)
}
