// variantd
// Main entry point for the variant question generator

use clap::Parser;
use variant_engine::cli::{Cli, Command};
use variant_engine::config::Config;
use variant_engine::handlers::{handle_check, handle_generate, handle_serve, OutputFormat};
use variant_engine::telemetry::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.server.log_level);
    init_logging(log_level);

    tracing::info!("variantd v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve { host, port } => handle_serve(config, host, port).await,
        Command::Generate { question, num } => {
            handle_generate(question, num, config, format).await
        }
        Command::Check => handle_check(config, format).await,
    }
}
