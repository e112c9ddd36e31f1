//! Extension command implementations.
//!
//! Provides CLI handlers for the `cms extension` subcommands: discover, list,
//! check and init. List and check drive a real [`ExtensionManager`] over an
//! in-memory host, so they report exactly what a running site would see at
//! startup.

use std::fs;

use cms_extensions::{
    DependencyPolicy, ExtensionCatalog, ExtensionFailure, ExtensionManager, ExtensionManifest,
    ManagerSettings, MemoryHost, class_name_for, validate_extension_id,
};
use colored::Colorize;

use crate::error::{CliError, Result};

fn build_manager(settings: &ManagerSettings, console: bool) -> ExtensionManager<MemoryHost> {
    let host = if console {
        MemoryHost::console()
    } else {
        MemoryHost::new()
    };
    ExtensionManager::new(host, settings.clone(), ExtensionCatalog::with_builtins())
}

fn failure_json(failure: &ExtensionFailure) -> serde_json::Value {
    serde_json::json!({
        "id": failure.id,
        "phase": failure.phase(),
        "reason": failure.reason.to_string(),
    })
}

fn print_failures<'a>(failures: impl Iterator<Item = &'a ExtensionFailure>) {
    for failure in failures {
        println!(
            "   {} {} [{}] {}",
            "x".red().bold(),
            failure.id.cyan(),
            failure.phase(),
            failure.reason.to_string().dimmed()
        );
    }
}

/// Handle `cms extension discover [--json]`
///
/// Lists directories that hold both an entry point and a valid manifest.
/// Nothing is instantiated.
pub fn handle_extension_discover(settings: &ManagerSettings, json: bool) -> Result<()> {
    let manager = build_manager(settings, false);
    let descriptors = manager.discover();

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    println!(
        "{} Extensions in {}:",
        "=>".blue().bold(),
        settings.extensions_dir.display()
    );
    if descriptors.is_empty() {
        println!("   No extensions found.");
    }
    for descriptor in &descriptors {
        println!(
            "   {} {} {}",
            descriptor.id.cyan(),
            descriptor.version().unwrap_or("-"),
            format!("({})", descriptor.class()).dimmed()
        );
    }

    Ok(())
}

/// Handle `cms extension list [--json] [--console]`
///
/// Registers and boots every extension, then prints each registered
/// extension with its enabled status, followed by any failures.
pub fn handle_extension_list(settings: &ManagerSettings, json: bool, console: bool) -> Result<()> {
    let mut manager = build_manager(settings, console);
    let report = manager.start();

    if json {
        let extensions: Vec<serde_json::Value> = manager
            .extensions()
            .map(|(id, extension)| {
                let info = extension.info();
                serde_json::json!({
                    "id": id,
                    "name": info.name,
                    "version": info.version,
                    "description": info.description,
                    "author": info.author,
                    "enabled": manager.is_enabled(id),
                })
            })
            .collect();
        let failures: Vec<serde_json::Value> = report.failures().map(failure_json).collect();
        let output = serde_json::json!({
            "extensions": extensions,
            "failures": failures,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} Registered extensions:", "=>".blue().bold());
    if manager.is_empty() {
        println!("   No extensions registered.");
    }
    for (id, extension) in manager.extensions() {
        let info = extension.info();
        let status = if manager.is_enabled(id) {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        println!(
            "   {} {} v{} {}",
            id.cyan(),
            info.name,
            info.version,
            format!("[{}]", status).bold()
        );
    }

    if !report.is_clean() {
        println!();
        println!("{} Failures:", "=>".red().bold());
        print_failures(report.failures());
    }

    if console && !manager.host().commands().is_empty() {
        println!();
        println!(
            "   {} {}",
            "Commands:".dimmed(),
            manager.host().commands().join(", ")
        );
    }

    Ok(())
}

/// Handle `cms extension check [--resolved] [--json]`
///
/// Registers every extension and fails when any of them could not be
/// registered.
pub fn handle_extension_check(settings: &ManagerSettings, resolved: bool, json: bool) -> Result<()> {
    let mut settings = settings.clone();
    if resolved {
        settings.dependency_policy = DependencyPolicy::Resolved;
    }
    let mut manager = build_manager(&settings, false);
    let report = manager.register_extensions();

    if json {
        let failures: Vec<serde_json::Value> = report.failed.iter().map(failure_json).collect();
        let output = serde_json::json!({
            "policy": settings.dependency_policy,
            "registered": report.succeeded,
            "failures": failures,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if report.is_clean() {
        println!(
            "{} {} extension(s) registered cleanly",
            "OK".green().bold(),
            report.succeeded.len()
        );
    } else {
        println!(
            "{} {} of {} extension(s) failed:",
            "=>".red().bold(),
            report.failed.len(),
            report.len()
        );
        print_failures(report.failed.iter());
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "{} extension(s) failed to register",
            report.failed.len()
        )))
    }
}

/// Handle `cms extension init <id> [--name] [--class]`
///
/// Creates `<extensions_dir>/<id>/` with a manifest and an entry point
/// stub. The class defaults to the naming convention for `id`.
pub fn handle_extension_init(
    settings: &ManagerSettings,
    id: &str,
    name: Option<&str>,
    class: Option<&str>,
) -> Result<()> {
    validate_extension_id(id).map_err(|e| CliError::user(e.to_string()))?;

    let dir = settings.extension_path(id);
    if dir.exists() {
        return Err(CliError::user(format!(
            "Extension directory '{}' already exists",
            dir.display()
        )));
    }

    let class = class.map_or_else(|| class_name_for(id), str::to_string);
    let manifest = ExtensionManifest {
        class: Some(class.clone()),
        name: Some(name.unwrap_or(id).to_string()),
        version: Some("0.1.0".to_string()),
        description: Some(String::new()),
        ..ExtensionManifest::default()
    };

    fs::create_dir_all(&dir)?;
    fs::write(dir.join(&settings.manifest_file), manifest.to_json()? + "\n")?;
    fs::write(
        dir.join(&settings.entry_point),
        format!(
            "// Entry point for the '{id}' extension.\n\
             //\n\
             // Register a factory for `{class}` in the site's ExtensionCatalog.\n"
        ),
    )?;
    tracing::info!(extension = id, path = %dir.display(), "Scaffolded extension");

    println!(
        "{} Created extension '{}' at {}",
        "=>".blue().bold(),
        id.cyan(),
        dir.display()
    );
    println!(
        "   {} Register a factory for {} and run {}",
        "Next:".dimmed(),
        class.bold(),
        "cms extension check".bold()
    );

    Ok(())
}
