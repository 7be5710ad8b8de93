use anyhow::Result;
use tracing::info;

use tripledb_sync_core::infrastructure::{ConfigLoader, Logger};
use tripledb_sync_core::Core;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load()?;
    let _logger = Logger::init(&config.logging)?;

    info!(worker_count = config.worker_count, "starting sync core");

    let core = Core::build(&config).await?;
    core.start().await;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    core.stop().await;

    Ok(())
}
