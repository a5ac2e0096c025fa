//! CLI interface for the cinema API

pub mod commands;
mod output;

pub use output::*;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cinema")]
#[command(author = "Krakaw")]
#[command(version = "1.0.0")]
#[command(about = "Cinema ticketing API with cookie-based JWT sessions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new cinema.toml with a freshly generated signing secret
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Configuration file (defaults to the nearest cinema.toml)
        #[arg(short, long, env = "CINEMA_CONFIG")]
        config: Option<PathBuf>,

        /// Host to bind to (overrides [server].host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate the configuration file
    Check {
        #[arg(short, long, env = "CINEMA_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show the effective access rules
    Rules {
        #[arg(short, long, env = "CINEMA_CONFIG")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Hash a password for seeding users by hand
    ///
    /// The password is prompted for on a terminal, otherwise read from the
    /// first line of stdin.
    HashPassword {
        /// bcrypt cost factor
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
