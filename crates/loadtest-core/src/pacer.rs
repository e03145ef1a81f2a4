//! Request pacing
//!
//! The pacer is a pure function of elapsed time and the number of ticks
//! already handed out. It targets an *average* rate: when the run falls
//! behind the whole-second schedule it releases ticks immediately, so short
//! catch-up bursts are normal.

use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Decision for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Sleep this long, then send. Zero means send now.
    Wait(Duration),

    /// The schedule can no longer be represented; end the run.
    Stop,
}

/// Fixed-rate pacer for a target QPS.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    qps: u64,
    interval_nanos: u64,
}

impl Pacer {
    /// Create a pacer. `qps` must be in `1..=MAX_QPS`; arguments are
    /// validated before a run is built.
    #[must_use]
    pub fn new(qps: u64) -> Self {
        let qps = qps.max(1);
        Self {
            qps,
            interval_nanos: (NANOS_PER_SEC / qps).max(1),
        }
    }

    /// Decide how long to wait before sending tick number `sent`.
    #[must_use]
    pub fn pace(&self, elapsed: Duration, sent: u64) -> Pace {
        let expected = self.qps.saturating_mul(elapsed.as_secs());
        if sent < expected {
            // Behind schedule, send immediately.
            return Pace::Wait(Duration::ZERO);
        }

        let target = match sent
            .checked_add(1)
            .and_then(|next| next.checked_mul(self.interval_nanos))
        {
            Some(nanos) => Duration::from_nanos(nanos),
            None => return Pace::Stop,
        };

        Pace::Wait(target.saturating_sub(elapsed))
    }
}
