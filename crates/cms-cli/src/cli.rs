//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CMS extension manager - inspect and scaffold extensions
#[derive(Parser, Debug)]
#[command(name = "cms")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (defaults to ./cms.toml when present)
    #[arg(long, global = true, env = "CMS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the extensions directory from the settings
    #[arg(long, global = true)]
    pub extensions_dir: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Manage extensions
    Extension {
        #[command(subcommand)]
        action: ExtensionAction,
    },
}

/// Extension subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ExtensionAction {
    /// List extension directories that qualify for registration
    Discover {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Register and boot every extension, then show their status
    ///
    /// Runs against an in-memory host, so nothing outside this process is
    /// touched.
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Simulate a console host, so extension commands are registered
        #[arg(long)]
        console: bool,
    },

    /// Check that every extension registers, and exit non-zero otherwise
    ///
    /// Examples:
    ///   cms extension check             # Use the configured dependency policy
    ///   cms extension check --resolved  # Order by dependencies and check versions
    Check {
        /// Use the resolved dependency policy regardless of settings
        #[arg(long)]
        resolved: bool,

        /// Output as JSON for CI/CD integration
        #[arg(long)]
        json: bool,
    },

    /// Scaffold a new extension directory
    Init {
        /// Extension id (the directory name)
        id: String,

        /// Display name written to the manifest
        #[arg(long)]
        name: Option<String>,

        /// Implementing class written to the manifest
        #[arg(long)]
        class: Option<String>,
    },
}
