//! stepwise CLI binary entry point.

use clap::Parser;
use stepwise::cli::{commands, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Run(args) => commands::handle_run(&cli, args).await,
        Commands::List(args) => commands::handle_list(&cli, args),
        Commands::Models => commands::handle_models(&cli),
        Commands::Key(args) => commands::handle_key(&cli, args).await,
    };

    if let Err(e) = result {
        tracing::debug!(category = e.category().as_str(), "run failed");
        eprintln!("Error: {}", e.diagnostic());
        std::process::exit(1);
    }
}
