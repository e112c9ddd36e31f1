//! The capability contract every extension implements.
//!
//! Concrete extensions embed an [`ExtensionState`] and expose it through
//! [`Extension::state`] / [`Extension::state_mut`]. Everything else has a
//! default: an extension that only contributes a service overrides
//! [`Extension::providers`] and nothing more.
//!
//! ```
//! use cms_extensions::{Extension, ExtensionContext, ExtensionInfo, ExtensionState, Provider, Service};
//! use std::sync::Arc;
//!
//! struct Sitemap {
//!     state: ExtensionState,
//! }
//!
//! impl Extension for Sitemap {
//!     fn id(&self) -> &str {
//!         "sitemap"
//!     }
//!
//!     fn info(&self) -> ExtensionInfo {
//!         ExtensionInfo::new("Sitemap", "1.0.0")
//!     }
//!
//!     fn state(&self) -> &ExtensionState {
//!         &self.state
//!     }
//!
//!     fn state_mut(&mut self) -> &mut ExtensionState {
//!         &mut self.state
//!     }
//!
//!     fn providers(&self) -> Vec<Provider> {
//!         vec![Provider::new("sitemap.builder", || Arc::new(()) as Service)]
//!     }
//! }
//!
//! let ctx = ExtensionContext::detached("sitemap");
//! let sitemap = Sitemap { state: ExtensionState::new(&ctx) };
//! assert!(!sitemap.is_enabled());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::config::ExtensionConfig;
use crate::host::{Host, HostError, Middleware, Provider};

/// Declared dependencies: extension id -> version constraint.
pub type Dependencies = BTreeMap<String, String>;

/// Declared listeners: event name -> listener references.
pub type Listeners = BTreeMap<String, Vec<String>>;

/// Result of one lifecycle call.
pub type LifecycleResult = Result<(), LifecycleError>;

/// Failure raised by an extension's own lifecycle code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The host refused something the extension tried to wire in.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The extension reported a failure.
    #[error("{reason}")]
    Failed { reason: String },
}

impl LifecycleError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Advisory display metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionInfo {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl ExtensionInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            author: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Everything a factory gets to construct one extension instance.
#[derive(Debug, Clone)]
pub struct ExtensionContext {
    /// Directory name the extension was discovered under.
    pub id: String,
    /// Extension directory.
    pub path: PathBuf,
    /// Configuration loaded from the extension's config directory.
    pub config: ExtensionConfig,
}

impl ExtensionContext {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, config: ExtensionConfig) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            config,
        }
    }

    /// A context with no directory and empty configuration.
    pub fn detached(id: impl Into<String>) -> Self {
        Self::new(id, PathBuf::new(), ExtensionConfig::new())
    }
}

/// Default per-instance state: configuration, enabled flag and location.
#[derive(Debug, Clone)]
pub struct ExtensionState {
    path: PathBuf,
    config: ExtensionConfig,
    enabled: bool,
}

impl ExtensionState {
    pub fn new(ctx: &ExtensionContext) -> Self {
        Self {
            path: ctx.path.clone(),
            config: ctx.config.clone(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ExtensionConfig {
        &mut self.config
    }

    /// The extension directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<extension>/resources[/relative]`
    pub fn resource_path(&self, relative: &str) -> PathBuf {
        join_relative(self.path.join("resources"), relative)
    }

    /// `<extension>/config[/relative]`
    pub fn config_path(&self, relative: &str) -> PathBuf {
        join_relative(self.path.join(crate::CONFIG_DIRNAME), relative)
    }
}

fn join_relative(base: PathBuf, relative: &str) -> PathBuf {
    let relative = relative.trim_start_matches(['/', '\\']);
    if relative.is_empty() {
        base
    } else {
        base.join(relative)
    }
}

/// Fixed capability set of an extension.
///
/// The manager calls [`register`](Extension::register) exactly once, then
/// [`boot`](Extension::boot); `boot` runs again whenever the extension is
/// re-enabled. Calling `boot` on an instance that was never registered is a
/// host ordering bug.
pub trait Extension: Send {
    /// Stable unique identifier.
    fn id(&self) -> &str;

    fn info(&self) -> ExtensionInfo;

    fn state(&self) -> &ExtensionState;

    fn state_mut(&mut self) -> &mut ExtensionState;

    /// Other extensions that must be registered first.
    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
    }

    fn providers(&self) -> Vec<Provider> {
        Vec::new()
    }

    fn middleware(&self) -> Vec<Middleware> {
        Vec::new()
    }

    fn listeners(&self) -> Listeners {
        Listeners::new()
    }

    fn commands(&self) -> Vec<String> {
        Vec::new()
    }

    /// Bind providers, and commands when the host runs in a console.
    fn register(&mut self, host: &mut dyn Host) -> LifecycleResult {
        for provider in self.providers() {
            host.bind_service(&provider.name, provider.factory)?;
        }
        if host.running_in_console() {
            for command in self.commands() {
                host.register_command(&command)?;
            }
        }
        Ok(())
    }

    /// Subscribe listeners and attach middleware, then mark enabled.
    fn boot(&mut self, host: &mut dyn Host) -> LifecycleResult {
        for (event, listeners) in self.listeners() {
            for listener in listeners {
                host.subscribe_listener(&event, &listener)?;
            }
        }
        for middleware in self.middleware() {
            host.attach_middleware(&middleware.target, &middleware.reference)?;
        }
        self.state_mut().set_enabled(true);
        Ok(())
    }

    /// Mark disabled. Registered providers stay bound.
    fn deactivate(&mut self, _host: &mut dyn Host) -> LifecycleResult {
        self.state_mut().set_enabled(false);
        Ok(())
    }

    /// Extension-specific teardown. The default only marks disabled.
    fn uninstall(&mut self, _host: &mut dyn Host) -> LifecycleResult {
        self.state_mut().set_enabled(false);
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.state().is_enabled()
    }

    fn config(&self) -> &ExtensionConfig {
        self.state().config()
    }

    fn get_config(&self, key: &str) -> Option<&Value> {
        self.state().config().get(key)
    }

    fn set_config(&mut self, key: &str, value: Value) {
        self.state_mut().config_mut().set(key, value);
    }
}

impl fmt::Debug for dyn Extension + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("id", &self.id())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
