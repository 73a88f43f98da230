use clap::Parser;
use mimalloc::MiMalloc;

use firegate::config::ServerConfig;
use firegate::lifecycle;
use firegate::logging_layer::init_tracing;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ServerConfig::parse();
    init_tracing(config.log_format)?;

    tracing::info!(
        root = %config.root.display(),
        credentials = %config.credentials.display(),
        "Starting firegate"
    );

    lifecycle::run(&config).await.map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;

    Ok(())
}
