//! skiffd — the Skiff daemon.
//!
//! Single binary that runs the whole orchestrator: state store, container
//! runtime connection, the three control loops, and the HTTP API.
//!
//! # Usage
//!
//! ```text
//! skiffd start --listen-addr 127.0.0.1:8080 --data-dir /var/lib/skiff
//! skiffd start --config /etc/skiff/skiff.toml
//! skiffd version
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use skiff_controllers::{NodeReporter, ServiceController, WorkloadController};
use skiff_core::Config;
use skiff_runtime::ContainerRuntime;
use skiff_state::Store;

/// How long shutdown waits for in-flight ticks to unwind.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "skiffd", about = "Skiff single-node container orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the orchestrator daemon.
    Start {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address the API server listens on.
        #[arg(long)]
        listen_addr: Option<String>,

        /// Data directory for persisted state.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Container runtime driver to use.
        #[arg(long)]
        runtime: Option<String>,

        /// Container runtime socket path.
        #[arg(long)]
        runtime_socket: Option<String>,

        /// Include error details in API responses.
        #[arg(long)]
        debug: bool,

        /// Workload reconcile period in seconds.
        #[arg(long, default_value = "5")]
        workload_interval: u64,

        /// Service reconcile period in seconds.
        #[arg(long, default_value = "10")]
        service_interval: u64,

        /// Node status report period in seconds.
        #[arg(long, default_value = "30")]
        node_interval: u64,
    },

    /// Print version information.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,skiffd=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Start {
            config,
            listen_addr,
            data_dir,
            runtime,
            runtime_socket,
            debug,
            workload_interval,
            service_interval,
            node_interval,
        } => {
            let mut cfg = match &config {
                Some(path) => Config::from_file(path)?,
                None => Config::default(),
            };
            if let Some(addr) = listen_addr {
                cfg.listen_addr = addr;
            }
            if let Some(dir) = data_dir {
                cfg.data_dir = dir;
            }
            if let Some(driver) = runtime {
                cfg.runtime.driver = driver;
            }
            if let Some(socket) = runtime_socket {
                cfg.runtime.socket_path = socket;
            }
            cfg.debug |= debug;

            run(
                cfg,
                Duration::from_secs(workload_interval),
                Duration::from_secs(service_interval),
                Duration::from_secs(node_interval),
            )
            .await
        }
        Command::Version => {
            println!("skiffd v{}", env!("CARGO_PKG_VERSION"));
            println!("Accepts Kubernetes Pod, Deployment, StatefulSet, and Service manifests");
            Ok(())
        }
    }
}

async fn run(
    config: Config,
    workload_period: Duration,
    service_period: Duration,
    node_period: Duration,
) -> anyhow::Result<()> {
    info!("skiffd starting");

    // ── State store ────────────────────────────────────────────

    let store = Store::open(&config.data_dir).context("failed to initialize state store")?;
    store.load();

    // ── Container runtime ──────────────────────────────────────

    let runtime =
        skiff_runtime::connect(&config.runtime).context("failed to create container runtime")?;
    runtime
        .health_check()
        .await
        .context("initial runtime connectivity check failed")?;
    info!(driver = %config.runtime.driver, "container runtime connected");

    // ── Control loops ──────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let workload = WorkloadController::new(store.clone(), runtime.clone());
    let workload_handle = tokio::spawn(workload.run(workload_period, shutdown_rx.clone()));

    let service = ServiceController::new(store.clone(), runtime.clone());
    let service_handle = tokio::spawn(service.run(service_period, shutdown_rx.clone()));

    let reporter = NodeReporter::new(store.clone(), runtime.clone());
    let node_handle = tokio::spawn(reporter.run(node_period, shutdown_rx));

    // ── API server ─────────────────────────────────────────────

    let router = skiff_api::build_router(store, runtime, config.debug);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "API server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // Bounded drain: loops observe the shutdown channel between ticks.
    let drain = async {
        let _ = workload_handle.await;
        let _ = service_handle.await;
        let _ = node_handle.await;
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        warn!("control loops did not stop within the shutdown window");
    }

    info!("skiffd stopped");
    Ok(())
}
