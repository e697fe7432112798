//! pathprobe binary entry point.
//!
//! Runs one or more test rounds against a target and prints each result
//! document as JSON on stdout. Logs go to stderr.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pathprobe::config::parse_duration;
use pathprobe::{ExecutionMode, PingProfile, Prober, ProberConfig, ProberError, TestResults};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// pathprobe - ICMP, TCP and HTTP diagnostics for one target
#[derive(Parser, Debug)]
#[command(name = "pathprobe", version, about, long_about = None)]
struct Cli {
    /// Target address, host:port or bare host (overrides config file)
    #[arg(env = "PATHPROBE_TARGET")]
    target: Option<String>,

    /// Path to configuration file
    #[arg(short, long, env = "PATHPROBE_CONFIG")]
    config: Option<String>,

    /// Use the fast ping profile (5 echoes, 5s timeout)
    #[arg(long)]
    fast: bool,

    /// Skip the ICMP probe
    #[arg(long)]
    no_ping: bool,

    /// Close TCP connections after each probe instead of pooling them
    #[arg(long)]
    no_reuse: bool,

    /// Run the three probes concurrently
    #[arg(long)]
    concurrent: bool,

    /// Number of test rounds
    #[arg(short = 'n', long, default_value_t = 1)]
    runs: u32,

    /// Pause between rounds
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    interval: Duration,

    /// Print one JSON document per line instead of pretty output
    #[arg(long)]
    compact: bool,
}

impl Cli {
    /// Build the effective configuration (CLI > ENV > config file > defaults).
    fn into_config(self) -> Result<(ProberConfig, RunOptions), Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path);
                ProberConfig::load(path)?
            }
            None => ProberConfig::new(String::new()),
        };

        if let Some(target) = self.target {
            config.target = target;
        }
        if self.fast {
            config = config.with_ping_profile(PingProfile::Fast);
        }
        if self.no_ping {
            config = config.with_ping_enabled(false);
        }
        if self.no_reuse {
            config = config.with_connection_reuse(false);
        }
        if self.concurrent {
            config = config.with_mode(ExecutionMode::Concurrent);
        }

        let options = RunOptions {
            runs: self.runs.max(1),
            interval: self.interval,
            compact: self.compact,
        };
        Ok((config, options))
    }
}

#[derive(Debug, Clone, Copy)]
struct RunOptions {
    runs: u32,
    interval: Duration,
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pathprobe=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let (config, options) = cli.into_config()?;

    tracing::info!(
        "Target: {}, ping: {} x{} ({:?}), mode: {:?}, reuse: {}",
        config.target,
        if config.ping.enabled { "on" } else { "off" },
        config.ping.count,
        config.ping.timeout,
        config.execution.mode,
        config.tcp.reuse_connections,
    );

    let prober = Arc::new(Prober::new(config)?);

    let signal_task = {
        let prober = Arc::clone(&prober);
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("Cancelling in-flight probes...");
            prober.close();
        })
    };

    let outcome = run_rounds(&prober, options).await;

    signal_task.abort();
    prober.close();
    tracing::info!("Shutdown complete");
    outcome
}

/// Run the requested rounds, printing each result document.
async fn run_rounds(prober: &Prober, options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = prober.cancellation_token();

    for round in 1..=options.runs {
        tracing::info!("Starting test round {}/{}", round, options.runs);
        let results = match prober.run_tests().await {
            Ok(results) => results,
            Err(ProberError::Closed) => break,
            Err(e) => return Err(e.into()),
        };
        emit(&results, options.compact)?;

        if round < options.runs {
            tokio::select! {
                _ = tokio::time::sleep(options.interval) => {}
                _ = cancel.cancelled() => break,
            }
        }
    }

    let stats = prober.pool().stats();
    tracing::debug!(
        dials = stats.dials,
        reuses = stats.reuses,
        discarded = stats.discarded,
        "Connection pool summary"
    );
    Ok(())
}

/// Write one result document to stdout.
fn emit(results: &TestResults, compact: bool) -> Result<(), Box<dyn std::error::Error>> {
    let json = if compact {
        serde_json::to_string(results)?
    } else {
        serde_json::to_string_pretty(results)?
    };
    tracing::debug!("Results data: {}", json);

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}")?;
    stdout.flush()?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "pathprobe",
            "example.com:8080",
            "--fast",
            "--no-reuse",
            "--concurrent",
            "-n",
            "3",
            "--interval",
            "250ms",
        ])
        .unwrap();

        let (config, options) = cli.into_config().unwrap();
        assert_eq!(config.target, "example.com:8080");
        assert_eq!(config.ping.count, 5);
        assert!(!config.tcp.reuse_connections);
        assert_eq!(config.execution.mode, ExecutionMode::Concurrent);
        assert_eq!(options.runs, 3);
        assert_eq!(options.interval, Duration::from_millis(250));
    }

    #[test]
    fn test_cli_rejects_bad_interval() {
        let result = Cli::try_parse_from(["pathprobe", "host", "--interval", "soon"]);
        assert!(result.is_err());
    }
}
