// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolekeeper: keeps Discord roles and messages converged with their
//! declared state.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rolekeeper_config::{ConfigError, RolekeeperConfig};

#[derive(Parser, Debug)]
#[command(name = "rolekeeper", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to Discord and run the reconciliation workers.
    Serve,
    /// Show queue depths of reaction rules and mass role operations.
    Status {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and exit.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<RolekeeperConfig, Vec<ConfigError>> {
    match path {
        Some(path) => rolekeeper_config::load_and_validate_path(path),
        None => rolekeeper_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            rolekeeper_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        Some(Commands::CheckConfig) => {
            println!(
                "rolekeeper: config ok (bot.name={}, storage.database_path={})",
                config.bot.name, config.storage.database_path
            );
            Ok(())
        }
        None => {
            println!("rolekeeper: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["rolekeeper", "status", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Status { json: true })));

        let cli =
            Cli::try_parse_from(["rolekeeper", "--config", "/tmp/rk.toml", "check-config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/rk.toml")));
    }

    #[test]
    fn defaults_load_without_files() {
        let config = rolekeeper_config::load_and_validate_str("").unwrap();
        assert_eq!(config.reaction_queue.max_attempts, 3);
    }
}
