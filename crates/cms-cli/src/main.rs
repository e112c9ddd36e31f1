//! CMS extension manager CLI
//!
//! Operator front end for the extension lifecycle core: discovery, status,
//! dependency checks and scaffolding.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands, ExtensionAction};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: cannot initialise logging: {}", "warning".yellow().bold(), e);
    }
    if cli.verbose {
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(Commands::Extension { action }) => {
            let cwd = std::env::current_dir()?;
            let settings = commands::load_settings(
                &cwd,
                cli.config.as_deref(),
                cli.extensions_dir.as_deref(),
            )?;
            execute_extension(action, &settings)
        }
        None => {
            // No command provided - show help hint
            println!("{} CMS extension manager", "cms".green().bold());
            println!();
            println!("Run {} for available commands.", "cms --help".cyan());
            Ok(())
        }
    }
}

fn execute_extension(action: ExtensionAction, settings: &cms_extensions::ManagerSettings) -> Result<()> {
    match action {
        ExtensionAction::Discover { json } => commands::handle_extension_discover(settings, json),
        ExtensionAction::List { json, console } => {
            commands::handle_extension_list(settings, json, console)
        }
        ExtensionAction::Check { resolved, json } => {
            commands::handle_extension_check(settings, resolved, json)
        }
        ExtensionAction::Init { id, name, class } => {
            commands::handle_extension_init(settings, &id, name.as_deref(), class.as_deref())
        }
    }
}
