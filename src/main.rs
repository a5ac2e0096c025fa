use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinema=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => cli::commands::init(force).await,
        Commands::Serve { config, host, port } => cli::commands::serve(config, host, port).await,
        Commands::Check { config } => cli::commands::check(config).await,
        Commands::Rules { config, format } => cli::commands::rules(config, format).await,
        Commands::HashPassword { cost } => cli::commands::hash_password(cost).await,
    }
}
