#![cfg(not(tarpaulin_include))]

use env_logger::Env;
use gantt_tracker::{app, config};

/// Main entry point for the web application
///
/// Reads the configuration from the environment (and `.env`), applies any
/// command-line overrides, then serves the tracker until the process exits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::init()?;
    log::info!("Starting Gantt tracker on {}", config.listen_addr());

    app::run(config).await
}
