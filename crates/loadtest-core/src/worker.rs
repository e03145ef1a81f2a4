//! Request worker

use std::sync::Arc;

use reqwest::{Client, Method};
use tokio::sync::mpsc;
use tracing::debug;

use crate::result::{RequestResult, RunState};
use crate::tick::TickReceiver;

/// What every worker of a run sends.
#[derive(Debug)]
pub(crate) struct RequestTemplate {
    pub client: Client,
    pub method: String,
    pub target: String,
}

/// One unit of the elastic pool: a request per tick until ticks close.
pub(crate) struct Worker {
    pub id: u64,
    pub template: Arc<RequestTemplate>,
    pub state: Arc<RunState>,
    pub ticks: TickReceiver,
    pub results: mpsc::Sender<RequestResult>,
}

impl Worker {
    pub(crate) async fn run(self) {
        while self.ticks.recv().await.is_some() {
            let result = self.send_request().await;
            if self.results.send(result).await.is_err() {
                debug!(worker = self.id, "result stream dropped, worker exiting");
                return;
            }
        }
        debug!(worker = self.id, "tick channel closed, worker exiting");
    }

    async fn send_request(&self) -> RequestResult {
        let stamp = self.state.stamp();
        let (code, error) = self.execute().await;

        RequestResult {
            success: error.is_empty(),
            latency: stamp.sent.elapsed(),
            timestamp: stamp.timestamp,
            seq: stamp.seq,
            error,
            code,
        }
    }

    /// Returns the status code (0 without a response) and the error text.
    async fn execute(&self) -> (u16, String) {
        let template = &self.template;

        let method = match Method::from_bytes(template.method.as_bytes()) {
            Ok(method) => method,
            Err(e) => return (0, e.to_string()),
        };

        let request = match template
            .client
            .request(method, template.target.as_str())
            .build()
        {
            Ok(request) => request,
            Err(e) => return (0, e.to_string()),
        };

        let response = match template.client.execute(request).await {
            Ok(response) => response,
            Err(e) => return (0, e.to_string()),
        };

        let status = response.status();
        // Dropping the response releases the body and connection.
        drop(response);

        let code = status.as_u16();
        if is_success(code) {
            (code, String::new())
        } else {
            (code, status.to_string())
        }
    }
}

/// 2xx and 3xx count as success.
pub(crate) fn is_success(code: u16) -> bool {
    (200..400).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick;
    use std::time::Duration;

    fn worker_for(
        target: &str,
        method: &str,
    ) -> (Worker, tick::TickSender, mpsc::Receiver<RequestResult>) {
        let (tick_tx, tick_rx) = tick::channel();
        let (result_tx, result_rx) = mpsc::channel(1);
        let worker = Worker {
            id: 0,
            template: Arc::new(RequestTemplate {
                client: Client::builder()
                    .timeout(Duration::from_secs(1))
                    .build()
                    .unwrap(),
                method: method.to_string(),
                target: target.to_string(),
            }),
            state: Arc::new(RunState::new()),
            ticks: tick_rx,
            results: result_tx,
        };
        (worker, tick_tx, result_rx)
    }

    #[test]
    fn test_success_range() {
        assert!(!is_success(0));
        assert!(!is_success(199));
        assert!(is_success(200));
        assert!(is_success(302));
        assert!(is_success(399));
        assert!(!is_success(400));
        assert!(!is_success(503));
    }

    #[tokio::test]
    async fn test_invalid_target_is_a_failed_result() {
        let (worker, mut ticks, mut results) = worker_for("not a url", "GET");
        let handle = tokio::spawn(worker.run());

        ticks.send().await.unwrap();
        let result = results.recv().await.unwrap();
        assert!(!result.success);
        assert_eq!(result.code, 0);
        assert!(!result.error.is_empty());
        assert_eq!(result.seq, 0);

        drop(ticks);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_method_is_a_failed_result() {
        let (worker, mut ticks, mut results) = worker_for("http://127.0.0.1:1/", "BAD METHOD");
        let handle = tokio::spawn(worker.run());

        ticks.send().await.unwrap();
        let result = results.recv().await.unwrap();
        assert!(!result.success);
        assert_eq!(result.code, 0);
        assert!(!result.error.is_empty());

        drop(ticks);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_failed_result() {
        // Port 1 on loopback is not expected to be listening.
        let (worker, mut ticks, mut results) = worker_for("http://127.0.0.1:1/", "GET");
        let handle = tokio::spawn(worker.run());

        for expected_seq in 0..2 {
            ticks.send().await.unwrap();
            let result = results.recv().await.unwrap();
            assert!(!result.success);
            assert_eq!(result.code, 0);
            assert_eq!(result.seq, expected_seq);
        }

        drop(ticks);
        handle.await.unwrap();
        assert!(results.recv().await.is_none());
    }
}
