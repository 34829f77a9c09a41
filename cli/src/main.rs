//! Preflight CLI binary
//!
//! Runs one batch of connectivity and credential probes against every
//! configured service and exits 0 only when nothing failed (skips are
//! permitted). An interrupted run still prints the partial report.

use clap::Parser;
use cli::{render, CliError};
use preflight_core::{default_registry, run_all, utils, ConfigMap, Report, ServiceRun};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;

#[derive(Parser)]
#[command(name = "preflight")]
#[command(about = "Connectivity and credential checks for every configured service")]
#[command(version = "0.1.0")]
struct Cli {
    /// Dotenv-style file loaded beneath the process environment
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Probe only the given service ids (repeatable)
    #[arg(long = "only", value_name = "SERVICE_ID")]
    only: Vec<String>,

    /// Number of services probed concurrently
    #[arg(long, default_value_t = 1)]
    parallel: usize,

    /// Also print the alert-forwarder payload as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> cli::Result<()> {
    utils::init_tracing("warn")?;

    let args = Cli::parse();

    let config = match &args.env_file {
        Some(path) => ConfigMap::from_env_file(path)?,
        None => ConfigMap::from_env(),
    };

    let mut registry = default_registry();
    if !args.only.is_empty() {
        for id in &args.only {
            if !registry.iter().any(|s| &s.id == id) {
                return Err(CliError::InvalidArgument(format!(
                    "unknown service id '{}'",
                    id
                )));
            }
        }
        registry.retain(|s| args.only.contains(&s.id));
    }
    utils::validate_registry(&registry)?;

    print!("{}", render::banner());

    let (tx, mut rx) = mpsc::unbounded_channel::<ServiceRun>();
    let handle = tokio::spawn(run_all(
        registry,
        Arc::new(config),
        args.parallel,
        Some(tx),
    ));

    // Sections render as services complete; the partial report survives an
    // interrupt so what was gathered is still printed.
    let mut partial = Report::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                print!("{}", render::summary(&partial));
                std::process::exit(1);
            }
            received = rx.recv() => match received {
                Some(run) => {
                    print!("{}", render::section(&run));
                    partial.extend(run.records);
                }
                None => break,
            }
        }
    }

    let report = match handle.await {
        Ok(report) => report,
        Err(e) => {
            error!("probe run failed: {}", e);
            std::process::exit(1);
        }
    };

    print!("{}", render::summary(&report));

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report.to_alert_payload())?
        );
    }

    if !report.ready() {
        std::process::exit(1);
    }
    Ok(())
}
