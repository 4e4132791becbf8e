mod args;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use noisia_core::config::NoisiaCfg;
use noisia_core::lifecycle::{OsSignals, Supervisor};
use noisia_core::workload::WorkloadSet;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::{Args, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(&args) {
        eprintln!("noisia: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let cfg = args.to_cfg();
    match redacted_json(&cfg) {
        Ok(json) => tracing::debug!(config = %json, "effective configuration"),
        Err(e) => tracing::debug!(error = %e, "could not render configuration"),
    }

    let mut supervisor = Supervisor::from_cfg(&cfg);
    match supervisor.run(cfg, Arc::new(WorkloadSet), OsSignals).await {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let level = args.log_level.as_str();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("noisia={level},noisia_core={level}")));
    let registry = tracing_subscriber::registry().with(filter);

    match args.log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()?,
    }
    Ok(())
}

/// Configuration as JSON with the connection string masked.
fn redacted_json(cfg: &NoisiaCfg) -> anyhow::Result<String> {
    let masked = NoisiaCfg {
        conninfo: "<redacted>".into(),
        ..cfg.clone()
    };
    Ok(serde_json::to_string(&masked)?)
}
