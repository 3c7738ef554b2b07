use anyhow::Result;

use tradepost::{config::Config, tpapi};

#[tokio::main]
async fn main() -> Result<()> {
    // Begin logger
    env_logger::init();

    // Load settings from the environment and .env
    let config = Config::load()?;
    log::info!("Starting tradepost with {config:?}");

    tpapi::run_server(config).await
}
