//! # Postman
//!
//! Relays messages between an L1 and an L2 chain: discovers `MessageSent` events, waits for
//! them to be anchored on the destination chain and claims them.
//!
//! ## Usage
//!
//! ```bash
//! CONFIG_DIR=./config cargo run
//! ```
use color_eyre::{eyre::WrapErr, Result};
use dotenvy::dotenv;
use log::info;

use postman_relayer::{
    bootstrap::{initialize_pollers, initialize_repository},
    config::{load_config, ServerConfig},
    logging::setup_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error reporting with eyre
    color_eyre::install().wrap_err("Failed to initialize error reporting")?;

    dotenv().ok();
    setup_logging().wrap_err("Failed to initialize logging")?;

    let server_config = ServerConfig::from_env();
    let config = load_config(&server_config.config_file_path)
        .wrap_err("Failed to load config file")?;

    let repository = initialize_repository(&server_config).await?;
    let service = initialize_pollers(&server_config, &config, repository)?;

    tokio::signal::ctrl_c()
        .await
        .wrap_err("Failed to listen for the shutdown signal")?;
    info!("Shutdown signal received, stopping pollers");
    service.stop().await;

    Ok(())
}
