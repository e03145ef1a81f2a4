use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use loadtest_core::{parse_duration, LoadTestArgs, Runner};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "loadtest")]
#[command(about = "Send HTTP requests to a target at a fixed rate", long_about = None)]
#[command(version)]
struct Cli {
    /// URL to send requests to
    target: String,

    /// Duration of the test, e.g. 30s or 5m [0 = forever]
    #[arg(long, value_parser = parse_duration)]
    duration: Option<Duration>,

    /// Queries per second
    #[arg(long)]
    qps: Option<u64>,

    /// Number of initial workers
    #[arg(long)]
    workers: Option<u64>,

    /// Max number of workers when autoscaling
    #[arg(long)]
    max_workers: Option<u64>,

    /// Whether to automatically scale the number of workers
    #[arg(long)]
    autoscale: Option<bool>,

    /// Timeout to wait for each request (seconds, or e.g. 500ms)
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// HTTP method to use
    #[arg(long)]
    method: Option<String>,

    /// Output file to write results to, or "stdout"
    #[arg(long)]
    output_file: Option<String>,

    /// Config file (YAML, TOML or JSON) with default arguments
    #[arg(long, env = "LOADTEST_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Layer explicit flags over file and environment configuration.
    fn into_args(self) -> Result<(String, LoadTestArgs), loadtest_core::LoadTestError> {
        let mut args = LoadTestArgs::load(self.config.as_deref())?;

        if let Some(duration) = self.duration {
            args.duration = duration;
        }
        if let Some(qps) = self.qps {
            args.qps = qps;
        }
        if let Some(workers) = self.workers {
            args.workers = workers;
        }
        if let Some(max_workers) = self.max_workers {
            args.max_workers = max_workers;
        }
        if let Some(autoscale) = self.autoscale {
            args.autoscale = autoscale;
        }
        if let Some(timeout) = self.timeout {
            args.timeout = timeout;
        }
        if let Some(method) = self.method {
            args.method = method;
        }
        if let Some(output_file) = self.output_file {
            args.output_file = output_file;
        }

        Ok((self.target, args))
    }
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (target, args) = cli.into_args()?;
    let runner = Runner::new(target, args)?;

    let summary = runner.run(forward_shutdown_signals()).await?;
    if summary.forced {
        warn!("Exiting without waiting for in-flight requests");
        return Ok(());
    }

    println!("{}", summary);
    info!("Load test complete");
    Ok(())
}

/// Forward every SIGINT/SIGTERM as a stop request.
///
/// Handlers are registered before this returns and live for the whole run,
/// so a signal arriving between two forwards is still delivered.
#[cfg(unix)]
fn forward_shutdown_signals() -> mpsc::UnboundedReceiver<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let (tx, rx) = mpsc::unbounded_channel();

    let (mut interrupt, mut terminate) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(interrupt), Ok(terminate)) => (interrupt, terminate),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to listen for shutdown signals");
                return rx;
            }
        };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = interrupt.recv() => info!("Received CTRL+C signal"),
                Some(()) = terminate.recv() => info!("Received SIGTERM signal"),
                else => return,
            }
            if tx.send(()).is_err() {
                return;
            }
        }
    });

    rx
}

#[cfg(not(unix))]
fn forward_shutdown_signals() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut interrupt = match tokio::signal::windows::ctrl_c() {
        Ok(interrupt) => interrupt,
        Err(e) => {
            warn!(error = %e, "failed to listen for shutdown signals");
            return rx;
        }
    };

    tokio::spawn(async move {
        while interrupt.recv().await.is_some() {
            info!("Received CTRL+C signal");
            if tx.send(()).is_err() {
                return;
            }
        }
    });

    rx
}

/// Initialize logging on stderr so CSV on stdout stays clean.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
