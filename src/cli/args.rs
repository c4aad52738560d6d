//! CLI argument definitions using clap
//!
//! Every command takes `--config <path>`. Mutating commands take
//! `--caller <identity>`: the identity the call is attributed to.
//! Keys are given either as a known name (`LENDING_ENGINE`, a registered
//! dynamic name) or as `0x`-prefixed hex.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// moduledir - governance-controlled module directory
#[derive(Parser, Debug)]
#[command(name = "moduledir")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./moduledir.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a fresh layout in the data directory
    Init,

    /// Print governance state and pending upgrades
    Status,

    /// Resolve a key
    Get {
        #[arg(long)]
        key: String,
    },

    /// Immediately write a key
    Set {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        identifier: String,
        /// Allow replacing a different existing identifier
        #[arg(long, default_value_t = false)]
        allow_replace: bool,
    },

    /// Propose a timelocked upgrade
    Schedule {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        identifier: String,
    },

    /// Commit a ready upgrade
    Execute {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        key: String,
    },

    /// Drop a pending upgrade, or every pending upgrade with --all
    Cancel {
        #[arg(long)]
        caller: String,
        #[arg(long, required_unless_present = "all")]
        key: Option<String>,
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Print the history of a key
    History {
        #[arg(long)]
        key: String,
        /// Oldest first instead of storage order
        #[arg(long, default_value_t = false)]
        chronological: bool,
    },

    /// Mint a dynamic key
    RegisterKey {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        name: String,
    },

    /// Set the pause gate
    Pause {
        #[arg(long)]
        caller: String,
    },

    /// Clear the pause gate
    Unpause {
        #[arg(long)]
        caller: String,
    },

    /// Sign a permit read as JSON from stdin
    SignPermit,

    /// Redeem a signed permit read as JSON from stdin
    SubmitPermit {
        /// Submitter of the permit
        #[arg(long)]
        caller: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

impl Command {
    /// Commands that never change the layout and so never rewrite it.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Command::Status | Command::Get { .. } | Command::History { .. }
        )
    }
}
