// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod config;
mod http;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use collectd_pipeline::writer::Writer;

use crate::config::Config;
use crate::http::AppState;

/// How long writers get to drain their queues on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "collectd-relay", version, about)]
struct Cli {
    /// Configuration file to use; /etc/collectd-relay/config.yaml is
    /// checked as a fallback.
    #[arg(long, default_value = "./cfg/config.yaml")]
    config_file: PathBuf,

    /// Listen address for the ingestion endpoint.
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Enable debug logs.
    #[arg(short, long)]
    debug: bool,
}

fn init_logging(debug: bool) -> anyhow::Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = format!("h2=off,hyper=off,rustls=off,{default_level}");
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(env_filter).context("could not parse log filter")?)
        .with_level(true)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug)?;
    debug!("debug enabled");

    let cfg = Config::load(&[
        cli.config_file.clone(),
        PathBuf::from(config::SYSTEM_CONFIG_PATH),
    ])?;
    if cfg.prometheus_writer.is_empty() {
        bail!("no writer instance in config");
    }

    let cancel_token = CancellationToken::new();
    let mut writers = Vec::new();
    let mut writer_tasks = Vec::new();
    for (index, writer_cfg) in cfg.prometheus_writer.iter().enumerate() {
        let (service, writer) = Writer::new(index, writer_cfg.clone(), cancel_token.clone())
            .with_context(|| format!("error starting writer instance {index}"))?;
        writer_tasks.push(tokio::spawn(service.run()));
        writers.push(writer);
    }

    let listen_addr = cli
        .listen_addr
        .or(cfg.listen_addr)
        .unwrap_or_else(|| "127.0.0.1:3001".to_string());
    let state = AppState {
        writers: Arc::new(writers),
    };
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("error binding listener on {listen_addr}"))?;
    info!("listening on {listen_addr}");

    let shutdown = cancel_token.clone();
    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                error!("failed to listen for shutdown signal");
            }
            info!("shutting down");
            shutdown.cancel();
        })
        .await
        .context("http server error")?;

    // Writers ship whatever is still queued, within the grace period
    let drain = async {
        for task in writer_tasks {
            let _ = task.await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        error!("writers did not drain within {SHUTDOWN_GRACE:?}, exiting anyway");
    }
    Ok(())
}
