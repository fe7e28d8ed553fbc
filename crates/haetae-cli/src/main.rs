//! Haetae
//!
//! Korean hate-speech detection toolkit: corpus preprocessing, stratified
//! splitting, LoRA adapter training, backend evaluation and an HTTP
//! inference server.

use clap::Parser;
use haetae_cli::cli::{Cli, Commands};
use haetae_cli::commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Preprocess(args) => commands::preprocess(args),
        Commands::Split(args) => commands::split(args),
        Commands::Train(args) => commands::run_train(args),
        Commands::Eval(args) => commands::eval(args).await,
        Commands::Serve(args) => commands::serve(args).await,
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("haetae=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("haetae=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
