//! mvirt-provision: provision controller daemon.
//!
//! This daemon:
//! - Loads Provision manifests into the record store
//! - Serves the REST edit path for provision records
//! - Reconciles each record's declared phase against Ncloud

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mvirt_provision::clients::ncloud::DEFAULT_API_URL;
use mvirt_provision::controller::Backoff;
use mvirt_provision::rest::{AppState, create_router};
use mvirt_provision::store::manifest;
use mvirt_provision::{
    Controller, ControllerConfig, DryRunProvider, MemoryStore, NcloudClient, NcloudConfig,
    OperationTable, ProviderClient, Reconciler, RecordStore,
};

/// mvirt Provision Controller
#[derive(Parser, Debug)]
#[command(name = "mvirt-provision", version, about)]
struct Args {
    /// Listen address for the REST API
    #[arg(short, long, default_value = "[::]:8090")]
    listen: String,

    /// Directory of Provision manifests (*.yaml) to load at startup
    #[arg(long)]
    manifest_dir: Option<PathBuf>,

    /// Ncloud API gateway base URL
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Default region code for provider calls
    #[arg(long, default_value = "KR")]
    region: String,

    /// Ncloud access key
    #[arg(long, env = "NCLOUD_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,

    /// Ncloud secret key
    #[arg(long, env = "NCLOUD_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Provider request timeout in seconds
    #[arg(long, default_value = "30")]
    request_timeout: u64,

    /// Number of concurrent reconciliation workers
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Initial retry delay in milliseconds after a transient failure
    #[arg(long, default_value = "500")]
    backoff_base_ms: u64,

    /// Maximum retry delay in seconds
    #[arg(long, default_value = "300")]
    backoff_max_secs: u64,

    /// Log provider requests instead of sending them
    #[arg(long)]
    dry_run: bool,
}

/// Log a background task that panicked or was aborted. Returns whether it
/// ended cleanly.
fn report_task(name: &str, result: Result<(), tokio::task::JoinError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("{} task failed: {}", name, e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mvirt_provision=info,tower_http=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting mvirt-provision controller");

    let provider: Arc<dyn ProviderClient> = if args.dry_run {
        warn!("Dry-run mode: provider requests are logged, not sent");
        Arc::new(DryRunProvider)
    } else {
        let access_key = args
            .access_key
            .context("Ncloud access key required (--access-key or NCLOUD_ACCESS_KEY)")?;
        let secret_key = args
            .secret_key
            .context("Ncloud secret key required (--secret-key or NCLOUD_SECRET_KEY)")?;

        info!("Ncloud API: {} (region {})", args.api_url, args.region);
        Arc::new(
            NcloudClient::new(NcloudConfig {
                api_url: args.api_url,
                region_code: args.region,
                access_key,
                secret_key,
                timeout: Duration::from_secs(args.request_timeout),
            })
            .context("Failed to create Ncloud client")?,
        )
    };

    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());

    if let Some(dir) = &args.manifest_dir {
        let manifests = manifest::load_dir(dir)
            .await
            .with_context(|| format!("Failed to load manifests from {}", dir.display()))?;
        let applied = manifest::apply_all(store.as_ref(), manifests)
            .await
            .context("Failed to apply manifests")?;
        info!("Applied {} provision manifest(s)", applied);
    }

    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&store),
        provider,
        OperationTable::new(),
    ));

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let controller = Arc::new(Controller::new(
        Arc::clone(&store),
        reconciler,
        ControllerConfig {
            workers: args.workers,
            backoff: Backoff::new(
                Duration::from_millis(args.backoff_base_ms),
                Duration::from_secs(args.backoff_max_secs),
            ),
        },
        shutdown_rx.clone(),
    ));
    let controller_handle = tokio::spawn(Arc::clone(&controller).run());

    // Start REST server
    let router = create_router(Arc::new(AppState {
        store: Arc::clone(&store),
    }));
    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!("REST API listening on {}", args.listen);

    let mut rest_shutdown = shutdown_rx;
    let rest_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                rest_shutdown.changed().await.ok();
            })
            .await
    });

    // Wait for shutdown signal
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;

    tokio::select! {
        _ = signal::ctrl_c() => info!("Received SIGINT"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }

    let _ = shutdown_tx.send(true);

    report_task("Controller", controller_handle.await);
    match rest_handle.await {
        Ok(Err(e)) => warn!("REST server error: {}", e),
        Err(e) => warn!("REST server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}
