//! Extension lifecycle core for the CMS.
//!
//! This crate discovers extension directories, parses their manifests,
//! checks declared dependencies, and drives each extension through
//! registration, boot, deactivation and uninstall against a [`Host`].
//!
//! Extension types are known up front through an [`ExtensionCatalog`];
//! a manifest's `class` (or the name derived from the directory) selects the
//! factory. Failures of individual extensions never propagate out of the
//! [`ExtensionManager`]; they are logged and returned as
//! [`ExtensionFailure`]s and [`BatchReport`]s.

pub mod builtin;
pub mod catalog;
pub mod config;
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod extension;
pub mod host;
pub mod manager;
pub mod manifest;
pub mod report;
pub mod settings;
pub mod shared;
pub mod version;

/// File name of the manifest inside each extension directory.
pub const MANIFEST_FILENAME: &str = "extension.json";

/// File name of the entry point that marks a directory as an extension.
pub const ENTRY_POINT_FILENAME: &str = "extension.rs";

/// Per-extension configuration directory.
pub const CONFIG_DIRNAME: &str = "config";

pub use builtin::{Greeter, HelloWorldExtension};
pub use catalog::{ExtensionCatalog, ExtensionFactory};
pub use config::ExtensionConfig;
pub use dependency::{DependencyGraph, ResolutionPlan};
pub use descriptor::ExtensionDescriptor;
pub use error::{Error, Result};
pub use extension::{
    Dependencies, Extension, ExtensionContext, ExtensionInfo, ExtensionState, LifecycleError,
    LifecycleResult, Listeners,
};
pub use host::{
    Host, HostError, MemoryHost, Middleware, MiddlewareTarget, Provider, Service, ServiceFactory,
};
pub use manager::ExtensionManager;
pub use manifest::{ExtensionManifest, class_name_for, validate_extension_id};
pub use report::{BatchReport, ExtensionFailure, FailureReason, Phase, StartupReport};
pub use settings::{DependencyPolicy, ManagerSettings};
pub use shared::SharedExtensionManager;
pub use version::VersionConstraint;
