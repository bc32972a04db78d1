//! Configuration management CLI commands.
//!
//! Provides `config init`, `config path` and `config show`.

use std::path::PathBuf;

use busbeacon::config::{config_file_path, ConfigFile};
use clap::Subcommand;

use super::common::GlobalOptions;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a commented config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Print the effective configuration
    Show,
}

/// Run a config subcommand.
pub fn run(options: &GlobalOptions, command: ConfigCommands) -> Result<(), CliError> {
    let path = options.config.clone().unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Init { force } => run_init(path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(path),
    }
}

fn run_init(path: PathBuf, force: bool) -> Result<(), CliError> {
    if force {
        ConfigFile::default().save_to(&path)?;
        println!("Wrote default configuration to {}", path.display());
    } else if ConfigFile::ensure_exists_at(&path)? {
        println!("Created {}", path.display());
    } else {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }
    println!("Set database_url in the [store] section before running 'busbeacon drive'.");
    Ok(())
}

fn run_show(path: PathBuf) -> Result<(), CliError> {
    let config = ConfigFile::load_from(&path)?;
    if path.exists() {
        println!("; Loaded from {}", path.display());
    } else {
        println!("; {} not found, showing defaults", path.display());
    }
    print!("{}", config.to_ini_string());
    Ok(())
}
