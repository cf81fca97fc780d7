//! clinicgate server binary

use anyhow::{Context, Result};
use clinicgate_common_log::LogConfig;
use clinicgate_server::{config::load_config, Server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = load_config()?;

    // Each CLINICGATE_LOG_* variable that is set wins over the config file.
    let log_config = LogConfig::from_settings(&config.logging.level, &config.logging.format)
        .with_env_overrides();
    clinicgate_common_log::init(log_config).context("Failed to initialize logging")?;

    info!("Starting clinicgate server v{}", env!("CARGO_PKG_VERSION"));

    let server = Server::new(config)?;
    server.run().await
}
