//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - daemon: serve the engine over the Unix socket
//! - run / simulate: drive one engine in-process
//! - start, stop, status, logs, watch, config-check: daemon clients

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ocihunt - keeps asking OCI for a free-tier ARM instance until one is created
#[derive(Parser, Debug)]
#[command(name = "ocihunt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Daemon socket path
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Whether this invocation talks to a running daemon
    pub fn is_client(&self) -> bool {
        self.command.is_client()
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Serve the engine in the foreground on the daemon socket
    Daemon,

    /// Run the engine in this process until it finishes (Ctrl-C stops gracefully)
    Run,

    /// Dry run against a scripted provider; nothing is created
    Simulate {
        /// Capacity failures before the simulated launch succeeds
        #[arg(short = 'n', long, default_value_t = 5)]
        capacity_failures: u32,

        /// Seconds between simulated attempts
        #[arg(short, long, default_value_t = 1)]
        interval: u64,

        /// End with a fatal authentication error instead of a launch
        #[arg(long)]
        fatal: bool,
    },

    /// Ask the daemon to start a run
    Start,

    /// Ask the daemon to stop the active run
    Stop,

    /// Show the daemon's run status
    Status {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },

    /// Print retained run events
    Logs {
        /// Only events with a sequence number above this
        #[arg(long)]
        since: Option<u64>,
    },

    /// Follow run events live
    Watch,

    /// Show which required settings are present
    ConfigCheck {
        /// Check the local configuration instead of asking the daemon
        #[arg(long)]
        local: bool,
    },
}

impl Commands {
    pub fn is_client(&self) -> bool {
        matches!(
            self,
            Commands::Start
                | Commands::Stop
                | Commands::Status { .. }
                | Commands::Logs { .. }
                | Commands::Watch
                | Commands::ConfigCheck { local: false }
        )
    }
}
