//! busbeacon CLI - Command-line interface
//!
//! Share a bus position as driver or collaborator, or follow it as staff.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::{GlobalOptions, ProducerRole, WatchMode};
use commands::config::ConfigCommands;
use commands::drive::DriveArgs;
use commands::watch::WatchArgs;

#[derive(Parser)]
#[command(name = "busbeacon")]
#[command(version, about = "Share and follow a live bus position", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.busbeacon/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (also mirrored to stderr)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Share this device's position as driver or collaborator
    Drive {
        /// Who is sharing
        #[arg(long, value_enum, default_value = "driver")]
        role: ProducerRole,

        /// Replay a recorded track file instead of the configured source
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Wait for 'start' instead of sharing right away
        #[arg(long)]
        no_autostart: bool,
    },

    /// Follow the live position as staff
    Watch {
        /// Push subscription or interval polling (default from config)
        #[arg(long, value_enum)]
        mode: Option<WatchMode>,

        /// Poll interval in milliseconds (implies --mode poll)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Print the current record once and exit
        #[arg(long)]
        once: bool,
    },

    /// Reset the shared record to its baseline (not sharing, no position)
    Reset,

    /// Check that the configured database is reachable
    Verify,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let options = GlobalOptions {
        config: cli.config,
        debug: cli.debug,
    };

    let result = match cli.command {
        Commands::Drive {
            role,
            replay,
            no_autostart,
        } => commands::drive::run(
            &options,
            DriveArgs {
                role,
                replay,
                no_autostart,
            },
        ),
        Commands::Watch {
            mode,
            interval_ms,
            once,
        } => commands::watch::run(
            &options,
            WatchArgs {
                mode,
                interval_ms,
                once,
            },
        ),
        Commands::Reset => commands::reset::run(&options),
        Commands::Verify => commands::verify::run(&options),
        Commands::Config { command } => commands::config::run(&options, command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
