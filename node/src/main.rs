// Copyright (c) 2026 Moltbook Contributors. MIT License.
// See LICENSE for details.

//! # Moltbook Privacy Node
//!
//! Entry point for the `moltbook-node` binary. Parses CLI arguments,
//! initializes logging and metrics, serves the HTTP façade, and runs the
//! TTL sweeper.
//!
//! Subcommands:
//!
//! - `run`     — start the privacy node
//! - `keygen`  — generate a client-side agent identity offline
//! - `status`  — query a running node's health endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use moltbook_protocol::client::{AgentClient, CredentialStore, FileCredentialStore};
use moltbook_protocol::service::PrivacyService;
use moltbook_protocol::storage::{BlobStore, MemoryBlobStore, SledBlobStore};

use cli::{Commands, NodeCli};
use logging::LogConfig;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = NodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full privacy node: API server, metrics endpoint, and the
/// background TTL sweeper.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    LogConfig::new(&args.log_level, &args.log_format).install();

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        ephemeral = args.ephemeral,
        "starting moltbook-node"
    );

    // --- Blob store ---
    let blobs: Arc<dyn BlobStore> = if args.ephemeral {
        tracing::warn!("ephemeral mode: nothing survives a restart");
        Arc::new(MemoryBlobStore::new())
    } else {
        let data_dir = cli::resolve_data_dir(&args.data_dir);
        let db_path = data_dir.join("blobs");
        std::fs::create_dir_all(&db_path)
            .with_context(|| format!("failed to create data directory: {}", db_path.display()))?;
        let store = SledBlobStore::open(&db_path)
            .with_context(|| format!("failed to open blob store at {}", db_path.display()))?;
        tracing::info!(path = %db_path.display(), "blob store opened");
        Arc::new(store)
    };

    // --- Service + metrics ---
    let service = Arc::new(PrivacyService::new(blobs));
    let node_metrics = Arc::new(NodeMetrics::new());

    let app_state = api::AppState {
        service: Arc::clone(&service),
        metrics: Arc::clone(&node_metrics),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- TTL sweeper ---
    // Expired envelopes are already invisible to reads; this pass
    // reclaims the storage behind them.
    let sweeper = if args.sweep_interval_secs > 0 {
        let service = Arc::clone(&service);
        let metrics = Arc::clone(&node_metrics);
        let interval_secs = args.sweep_interval_secs;
        Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                let timer = metrics.sweep_duration_seconds.start_timer();
                match service.sweep_expired().await {
                    Ok(swept) => {
                        metrics.sweeps_total.inc();
                        metrics.messages_swept_total.inc_by(swept as u64);
                    }
                    Err(e) => tracing::error!("sweeper pass failed: {}", e),
                }
                timer.observe_duration();
            }
        }))
    } else {
        tracing::warn!("TTL sweeper disabled");
        None
    };

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    tracing::info!("moltbook-node stopped");
    Ok(())
}

/// Generates a fresh agent identity and writes the credentials file.
/// Private keys never leave this machine; registration happens later,
/// from the client, against a running node.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    LogConfig::new("info", "pretty").install();

    let store = FileCredentialStore::new(&args.out);
    if !args.force && store.load().map(|c| c.is_some()).unwrap_or(false) {
        anyhow::bail!(
            "credentials file already exists: {} (pass --force to overwrite)",
            args.out.display()
        );
    }

    let client = AgentClient::generate();
    client
        .persist(&store)
        .with_context(|| format!("failed to write credentials to {}", args.out.display()))?;

    println!("Agent identity generated.");
    println!("  DID             : {}", client.did());
    println!("  Agreement key   : {}", client.keypair().public_key());
    println!("  Signing key     : {}", client.keypair().signing_key());
    println!("  Credentials file: {}", args.out.display());
    if let Some(name) = args.display_name {
        println!("  Display name    : {name} (pass it in the registration profile)");
    }
    Ok(())
}

/// Queries a running node's health endpoint and prints the body.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .context("failed to build HTTP client")?;

    let url = format!("{}/health", args.api_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("failed to read response body")?;
    if !status.is_success() {
        anyhow::bail!("node returned {status}: {body}");
    }
    println!("{}", body);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("moltbook-node {}", env!("CARGO_PKG_VERSION"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
