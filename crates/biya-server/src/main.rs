mod handlers;
mod jobs;
mod router;

use std::{path::PathBuf, sync::Arc};

use biya_collectors::Scheduler;
use biya_common::{
    Config,
    config::{LogConfig, LogFormat},
};
use biya_metrics::{BuildInfo, ExporterMetrics};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::router::{ExporterState, exporter_router};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "biya-exporter", about = "Prometheus exporter for the Biya chain")]
struct Cli {
    /// YAML or JSON configuration file; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    listen_addr: Option<String>,

    /// debug | info | warn | error
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(listen_addr) = cli.listen_addr {
        config.http.listen_addr = listen_addr;
    }
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    init_tracing(&config.log)?;

    let build = BuildInfo::new(
        env!("CARGO_PKG_VERSION"),
        option_env!("BIYA_EXPORTER_COMMIT").unwrap_or("none"),
    );
    let metrics = Arc::new(ExporterMetrics::new(config.chain.chain_id.clone(), &build));
    let jobs = jobs::build_jobs(&config, &metrics)?;
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&metrics), jobs));

    let shutdown = CancellationToken::new();
    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = scheduler.run(shutdown.clone()).await {
                error!(error = %err, error_kind = err.kind(), "scheduler refused to start");
                shutdown.cancel();
            }
        })
    };

    let app = exporter_router(Arc::new(ExporterState::new(metrics, scheduler)));
    let listener = tokio::net::TcpListener::bind(&config.http.listen_addr).await?;
    info!(
        listen_addr = %config.http.listen_addr,
        chain_id = %config.chain.chain_id,
        version = %build.version,
        commit = %build.commit,
        "biya exporter listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(err) = scheduler_task.await {
        error!(error = %err, "scheduler task panicked");
    }
    info!("biya exporter stopped");

    Ok(())
}

/// `RUST_LOG` wins when set; otherwise `log.level` applies to every `biya`
/// crate.
fn init_tracing(log: &LogConfig) -> Result<(), BoxError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("biya={}", log.level.trim().to_ascii_lowercase()))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    match log.format {
        LogFormat::Json => builder.json().try_init()?,
        LogFormat::Text => builder.try_init()?,
    }
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => shutdown.cancel(),
        _ = shutdown.cancelled() => {}
    }
    info!("shutting down");
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!(error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received Ctrl-C"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl-C");
}
