mod cli;
mod commands;
mod config;
mod service;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::Config;
use service::SearchCacheService;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load()?;
    if cli.debug {
        config.logging.debug = true;
    }

    searchcache_logging::init_logging(config.log_level(), config.log_format()?)?;
    debug!(
        "Loaded config: cache.path={}, search.tool={}",
        config.cache.path, config.search.tool
    );

    let service = SearchCacheService::build(&config).await?;
    let result = commands::run(cli.command, service.gate()).await;
    service.shutdown().await;

    println!("{}", result?);
    Ok(())
}
