//! BearingKG CLI - Main entry point

use bearingkg_cli::{commands, config, Cli, Command, Formatter};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing (log to stderr, stdout carries the results)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> bearingkg_cli::Result<()> {
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref(), cli.preset)?;
    let formatter = Formatter::new(cli.format, !cli.no_color);

    match cli.command {
        Command::Process(args) => commands::execute_process(args, config, &formatter).await,
        Command::Chunk(args) => commands::execute_chunk(args, &config, &formatter).await,
        Command::Config => commands::execute_config(&config),
    }
}
