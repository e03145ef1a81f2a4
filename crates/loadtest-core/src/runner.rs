//! Load test lifecycle
//!
//! [`Runner`] owns the run configuration, the HTTP client and the stop
//! signal. [`Runner::start`] launches the dispatcher and returns the result
//! stream; [`Runner::run`] additionally writes every result, bridges
//! external stop requests, and produces a [`Summary`].

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::LoadTestArgs;
use crate::dispatcher::Dispatcher;
use crate::error::{LoadTestError, Result};
use crate::output::ResultWriter;
use crate::result::ResultStream;
use crate::stop::StopSignal;
use crate::summary::{Summary, SummaryCollector};
use crate::worker::RequestTemplate;

/// Results buffered between workers and the consumer.
const RESULT_BUFFER: usize = 64;

pub struct Runner {
    args: Arc<LoadTestArgs>,
    template: Arc<RequestTemplate>,
    stop: StopSignal,
}

impl Runner {
    /// Validate `args` and build the HTTP client for `target`.
    pub fn new(target: impl Into<String>, args: LoadTestArgs) -> Result<Self> {
        args.validate()?;

        let client = Client::builder()
            .timeout(args.timeout)
            .build()
            .map_err(LoadTestError::Client)?;

        Ok(Self {
            template: Arc::new(RequestTemplate {
                client,
                method: args.method.clone(),
                target: target.into(),
            }),
            args: Arc::new(args),
            stop: StopSignal::new(),
        })
    }

    /// Start generating load. Must be called within a Tokio runtime.
    ///
    /// The stop signal is shared by every run of this runner: once stopped,
    /// later runs end immediately.
    pub fn start(&self) -> ResultStream {
        let (tx, rx) = mpsc::channel(RESULT_BUFFER);
        let workers = Arc::new(AtomicU64::new(0));

        info!(
            target_url = %self.template.target,
            method = %self.args.method,
            qps = self.args.qps,
            duration = ?self.args.duration,
            workers = self.args.workers,
            max_workers = self.args.max_workers,
            autoscale = self.args.autoscale,
            "starting load test"
        );

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.args),
            Arc::clone(&self.template),
            self.stop.clone(),
            tx,
            Arc::clone(&workers),
        );
        tokio::spawn(dispatcher.run());

        ResultStream::new(rx, workers)
    }

    /// Request a graceful stop. Returns `false` if one was already requested.
    pub fn stop(&self) -> bool {
        self.stop.trigger()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_triggered()
    }

    /// Run to completion, writing each result to the configured output.
    ///
    /// Each message on `stop_requests` is an external stop request. The first
    /// starts a graceful drain; a second abandons the run and returns at once
    /// with [`Summary::forced`] set.
    pub async fn run(&self, mut stop_requests: mpsc::UnboundedReceiver<()>) -> Result<Summary> {
        // Open the output before any request is sent.
        let writer = ResultWriter::create(&self.args.output_file)?;
        self.run_with_writer(writer, &mut stop_requests).await
    }

    /// Same as [`Runner::run`] with a caller-provided writer.
    pub async fn run_with_writer(
        &self,
        mut writer: ResultWriter,
        stop_requests: &mut mpsc::UnboundedReceiver<()>,
    ) -> Result<Summary> {
        let mut results = self.start();
        let mut collector = SummaryCollector::new();
        let mut listening = true;

        loop {
            tokio::select! {
                next = results.next() => match next {
                    Some(result) => {
                        if let Err(e) = writer.write(&result) {
                            self.stop();
                            return Err(e);
                        }
                        collector.record(&result);
                    }
                    None => return Ok(collector.finish(false)),
                },
                request = stop_requests.recv(), if listening => match request {
                    Some(()) => {
                        if self.stop() {
                            info!("Shutting down...");
                        } else {
                            warn!("second stop request, abandoning in-flight requests");
                            return Ok(collector.finish(true));
                        }
                    }
                    None => listening = false,
                },
            }
        }
    }
}
