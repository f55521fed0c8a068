//! The ferrier daemon: wires the queue store, MX resolver, delivery
//! orchestrator, and scheduler together, then runs until ctrl-c.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::Parser;
use ferrier_common::{Signal, logging};
use ferrier_delivery::{DeliveryOrchestrator, MxResolver, Scheduler, config::DeliveryConfig};
use ferrier_queue::{MemoryQueueStore, QueueStore};
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "ferrier", version, about = "Outbound mail delivery engine")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "ferrier.toml")]
    config: PathBuf,
}

fn load_config(path: &Path) -> anyhow::Result<DeliveryConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "Configuration file not found, using defaults");
        return Ok(DeliveryConfig::default());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration from {}", path.display()))?;

    toml::from_str(&text)
        .with_context(|| format!("parsing configuration from {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
    let resolver =
        Arc::new(MxResolver::new(&config.dns).context("initialising DNS resolver")?);

    let scheduler_config = config.scheduler.clone();
    let orchestrator = Arc::new(DeliveryOrchestrator::new(
        Arc::clone(&store),
        resolver,
        config,
    ));
    let scheduler = Scheduler::new(store, orchestrator, scheduler_config);

    let (shutdown, receiver) = broadcast::channel(1);
    let worker = tokio::spawn(async move { scheduler.run(receiver).await });

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;
    info!("Shutdown requested");

    shutdown
        .send(Signal::Shutdown)
        .context("signalling shutdown")?;
    worker.await.context("joining scheduler")?;

    Ok(())
}
