//! Per-request outcome records and the stream that delivers them

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Outcome of one request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResult {
    /// Status in 200-399 and no transport error.
    pub success: bool,

    /// Wall time from send to completion.
    pub latency: Duration,

    /// Send time.
    pub timestamp: DateTime<Utc>,

    /// Send-order sequence number, unique within a run.
    pub seq: u64,

    /// Empty on success.
    pub error: String,

    /// HTTP status, 0 if no response was received.
    pub code: u16,
}

impl RequestResult {
    /// Send timestamp in nanoseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp.timestamp_nanos_opt().unwrap_or_default()
    }
}

/// Send-time bookkeeping shared by every worker of a run.
#[derive(Debug)]
pub(crate) struct RunState {
    began: Instant,
    began_at: DateTime<Utc>,
    seq: Mutex<u64>,
}

/// Sequence number and clock readings taken at the moment of sending.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SendStamp {
    pub seq: u64,
    pub sent: Instant,
    pub timestamp: DateTime<Utc>,
}

impl RunState {
    pub(crate) fn new() -> Self {
        Self {
            began: Instant::now(),
            began_at: Utc::now(),
            seq: Mutex::new(0),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.began.elapsed()
    }

    /// Assign the next sequence number.
    ///
    /// The clock is read under the lock so timestamps never decrease in
    /// sequence order.
    pub(crate) fn stamp(&self) -> SendStamp {
        let mut seq = self.seq.lock();
        let sent = Instant::now();
        let offset = sent.duration_since(self.began);
        let stamp = SendStamp {
            seq: *seq,
            sent,
            timestamp: self.began_at
                + chrono::Duration::nanoseconds(offset.as_nanos().min(i64::MAX as u128) as i64),
        };
        *seq += 1;
        stamp
    }
}

/// Results of a running load test, in completion order.
///
/// The stream ends once every worker has exited. Drain it to completion to
/// be sure the run is over.
#[derive(Debug)]
pub struct ResultStream {
    rx: mpsc::Receiver<RequestResult>,
    workers: Arc<AtomicU64>,
}

impl ResultStream {
    pub(crate) fn new(rx: mpsc::Receiver<RequestResult>, workers: Arc<AtomicU64>) -> Self {
        Self { rx, workers }
    }

    /// Number of workers spawned so far. Never decreases during a run.
    #[must_use]
    pub fn worker_count(&self) -> u64 {
        self.workers.load(Ordering::Acquire)
    }
}

impl Stream for ResultStream {
    type Item = RequestResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
