//! Rate-controlled concurrent HTTP load generation.
//!
//! A [`Runner`] paces ticks at a target QPS onto an elastic pool of workers.
//! Each tick becomes exactly one request and one [`RequestResult`], carrying
//! a send-order sequence number. The pool grows when no worker is idle at
//! tick time (up to `max_workers`) and otherwise applies backpressure.
//!
//! ```no_run
//! use futures::StreamExt;
//! use loadtest_core::{LoadTestArgs, Runner};
//! use std::time::Duration;
//!
//! # async fn example() -> loadtest_core::Result<()> {
//! let args = LoadTestArgs {
//!     duration: Duration::from_secs(10),
//!     qps: 50,
//!     ..Default::default()
//! };
//! let runner = Runner::new("http://localhost:8080/health", args)?;
//!
//! let mut results = runner.start();
//! while let Some(result) = results.next().await {
//!     println!("{} {} {:?}", result.seq, result.code, result.latency);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod dispatcher;
pub mod error;
pub mod output;
pub mod pacer;
pub mod result;
pub mod runner;
pub mod stop;
pub mod summary;
mod tick;
mod worker;

pub use config::{parse_duration, LoadTestArgs};
pub use error::{LoadTestError, Result};
pub use output::ResultWriter;
pub use result::{RequestResult, ResultStream};
pub use runner::Runner;
pub use stop::StopSignal;
pub use summary::Summary;
