// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ChatRelay -- multi-tenant webhook message router.
//!
//! Binary entry point: config loading, tracing setup, and the serve loop.

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// ChatRelay -- multi-tenant webhook message router.
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the standard hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook router server.
    Serve,
    /// Print the effective configuration and exit.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> chatrelay_config::ChatRelayConfig {
    let result = match path {
        Some(path) => chatrelay_config::load_config_from_path(path),
        None => chatrelay_config::load_config(),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("chatrelay: invalid configuration: {e}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run(config).await {
                tracing::error!(error = %e, "server exited with error");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("chatrelay: failed to render config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("chatrelay: use --help for available commands");
        }
    }
}
