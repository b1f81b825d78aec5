//! gpugrid daemon
//!
//! Builds the simulated cluster, drives simulated time from the wall clock
//! and serves the REST API.

use anyhow::Context;
use clap::Parser;
use gpugrid_api::create_router;
use gpugrid_core::{GridConfig, PolicyKind};
use gpugrid_scheduler::Cluster;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// gpugrid daemon - simulated GPU cluster with a telemetry-aware scheduler
#[derive(Parser, Debug)]
#[command(name = "gpugridd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Address to bind the API server
    #[arg(long)]
    address: Option<String>,

    /// Port for the REST API server
    #[arg(long)]
    port: Option<u16>,

    /// Number of simulated GPU nodes
    #[arg(long)]
    nodes: Option<usize>,

    /// Simulated seconds per wall-clock second
    #[arg(long)]
    speed: Option<f64>,

    /// Placement policy (fifo, scored)
    #[arg(long)]
    policy: Option<PolicyKind>,

    /// Seed for the simulation random source
    #[arg(long)]
    seed: Option<u64>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<GridConfig> {
        let mut config = match &self.config {
            Some(path) => GridConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => GridConfig::default(),
        };

        if let Some(address) = self.address {
            config.api.address = address;
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        if let Some(nodes) = self.nodes {
            config.simulation.num_nodes = nodes;
        }
        if let Some(speed) = self.speed {
            config.simulation.speed_factor = speed;
        }
        if let Some(policy) = self.policy {
            config.scheduler.policy = policy;
        }
        if self.seed.is_some() {
            config.simulation.seed = self.seed;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;

    // Initialize logging
    let log_level = config
        .logging
        .level
        .parse::<Level>()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Starting gpugrid daemon v{}", env!("CARGO_PKG_VERSION"));

    let cluster = Arc::new(Cluster::new(&config)?);
    info!(
        nodes = config.simulation.num_nodes,
        policy = %config.scheduler.policy,
        speed = config.simulation.speed_factor,
        "Cluster ready"
    );

    let driver = spawn_driver(
        cluster.clone(),
        config.simulation.speed_factor,
        Duration::from_millis(config.simulation.tick_millis),
    );

    let router = create_router(cluster, &config.api);

    let addr: SocketAddr = format!("{}:{}", config.api.address, config.api.port)
        .parse()
        .context("invalid listen address")?;

    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    driver.abort();
    info!("gpugrid daemon stopped");
    Ok(())
}

/// Advance simulated time by `speed × elapsed` on every tick
fn spawn_driver(cluster: Arc<Cluster>, speed: f64, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last = Instant::now();

        loop {
            interval.tick().await;
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64() * speed;
            last = now;

            let finished = cluster.advance(dt).await;
            for task in &finished {
                debug!(task_id = %task.task_id, status = %task.status, "Task finished");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
