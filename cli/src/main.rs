//! A3S Forge CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_forge_cli::commands::{dispatch, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --log-level wins over RUST_LOG
    let filter = match cli.log_level.as_deref() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
