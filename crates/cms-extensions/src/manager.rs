//! The extension registry: discovery, registration, boot and runtime
//! enable/disable.
//!
//! Nothing an individual extension does can make the manager fail. Every
//! per-extension problem (unreadable manifest, unknown class, unmet
//! dependency, lifecycle error or panic) is logged, reported through
//! [`ExtensionFailure`] or a [`BatchReport`], and the extension is left out
//! of the registered or enabled set.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use crate::catalog::ExtensionCatalog;
use crate::config::ExtensionConfig;
use crate::dependency::{self, check_dependencies};
use crate::descriptor::ExtensionDescriptor;
use crate::extension::{Dependencies, Extension, ExtensionContext};
use crate::host::Host;
use crate::manifest::{ExtensionManifest, validate_extension_id};
use crate::report::{BatchReport, ExtensionFailure, FailureReason, Phase, StartupReport};
use crate::settings::{DependencyPolicy, ManagerSettings};

/// One registered extension.
struct Entry {
    id: String,
    version: String,
    dependencies: Dependencies,
    extension: Box<dyn Extension>,
}

/// Owns every registered extension and drives their lifecycle against a
/// host.
///
/// Registration order is preserved: [`boot_extensions`](Self::boot_extensions)
/// and the query methods walk extensions in the order they were registered.
pub struct ExtensionManager<H: Host> {
    host: H,
    settings: ManagerSettings,
    catalog: ExtensionCatalog,
    registered: Vec<Entry>,
    /// Ids in the order they were enabled. Always a subset of `registered`.
    enabled: Vec<String>,
}

impl<H: Host> ExtensionManager<H> {
    pub fn new(host: H, settings: ManagerSettings, catalog: ExtensionCatalog) -> Self {
        Self {
            host,
            settings,
            catalog,
            registered: Vec::new(),
            enabled: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &ExtensionCatalog {
        &self.catalog
    }

    /// Mutable catalog access, for hosts that add factories after startup.
    pub fn catalog_mut(&mut self) -> &mut ExtensionCatalog {
        &mut self.catalog
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Scan the extensions directory for installable extensions.
    ///
    /// A subdirectory qualifies only if it holds both the entry point and a
    /// manifest that parses. Anything else is skipped without error. A
    /// missing extensions directory is created (unless disabled in the
    /// settings) and yields nothing. Results are sorted by directory name.
    pub fn discover(&self) -> Vec<ExtensionDescriptor> {
        let root = &self.settings.extensions_dir;
        if !root.is_dir() {
            if self.settings.create_missing_dir {
                match std::fs::create_dir_all(root) {
                    Ok(()) => tracing::info!(path = %root.display(), "Created extensions directory"),
                    Err(e) => tracing::warn!(path = %root.display(), "Cannot create extensions directory: {}", e),
                }
            }
            return Vec::new();
        }

        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %root.display(), "Cannot read extensions directory: {}", e);
                return Vec::new();
            }
        };

        let mut dirs: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        dirs.into_iter()
            .filter_map(|dir| self.describe(&dir))
            .collect()
    }

    fn describe(&self, dir: &Path) -> Option<ExtensionDescriptor> {
        let Some(id) = dir.file_name().and_then(|n| n.to_str()) else {
            tracing::debug!(path = %dir.display(), "Skipping directory with non UTF-8 name");
            return None;
        };

        if !dir.join(&self.settings.entry_point).is_file() {
            tracing::debug!(extension = id, "Skipping directory without {}", self.settings.entry_point);
            return None;
        }

        let manifest_path = dir.join(&self.settings.manifest_file);
        if !manifest_path.is_file() {
            tracing::debug!(extension = id, "Skipping directory without {}", self.settings.manifest_file);
            return None;
        }

        match ExtensionManifest::from_path(&manifest_path) {
            Ok(manifest) => Some(ExtensionDescriptor::new(id, dir, manifest)),
            Err(e) => {
                tracing::debug!(extension = id, "Skipping directory with unusable manifest: {}", e);
                None
            }
        }
    }

    /// Discover and register every extension.
    ///
    /// Under [`DependencyPolicy::RegistrationOrder`] descriptors are
    /// processed in discovery order, so a dependency that sorts after its
    /// dependent is reported unmet. Under [`DependencyPolicy::Resolved`]
    /// they are first ordered dependency-first.
    pub fn register_extensions(&mut self) -> BatchReport {
        let descriptors = self.discover();
        let mut report = BatchReport::new();

        let ordered: Vec<&ExtensionDescriptor> = match self.settings.dependency_policy {
            DependencyPolicy::RegistrationOrder => descriptors.iter().collect(),
            DependencyPolicy::Resolved => {
                let registered: BTreeSet<String> =
                    self.registered.iter().map(|e| e.id.clone()).collect();
                let plan = dependency::plan(&descriptors, &registered);
                for (id, reason) in plan.rejected {
                    let failure = ExtensionFailure::new(id, reason);
                    tracing::warn!("Extension excluded: {}", failure);
                    report.record_failure(failure);
                }
                plan.order
                    .iter()
                    .filter_map(|id| descriptors.iter().find(|d| &d.id == id))
                    .collect()
            }
        };

        for descriptor in ordered {
            match self.register_descriptor(descriptor) {
                Ok(_) => report.record_success(descriptor.id.clone()),
                Err(failure) => report.record_failure(failure),
            }
        }

        tracing::debug!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Extension registration finished"
        );
        report
    }

    /// Register the extension in directory `path` under `id`.
    ///
    /// Returns the already-registered instance when `id` is registered,
    /// without reading anything from disk.
    pub fn register_extension(
        &mut self,
        id: &str,
        path: &Path,
    ) -> Result<&dyn Extension, ExtensionFailure> {
        if self.is_registered(id) {
            return self
                .extension(id)
                .ok_or_else(|| ExtensionFailure::new(id, FailureReason::UnknownExtension));
        }

        let manifest_path = path.join(&self.settings.manifest_file);
        let manifest = ExtensionManifest::from_path(&manifest_path).map_err(|e| {
            let failure = ExtensionFailure::new(
                id,
                FailureReason::ManifestUnreadable {
                    path: manifest_path.clone(),
                    reason: e.to_string(),
                },
            );
            tracing::warn!("{}", failure);
            failure
        })?;

        let descriptor = ExtensionDescriptor::new(id, path, manifest);
        self.register_descriptor(&descriptor)
    }

    /// Register an already-discovered extension.
    pub fn register_descriptor(
        &mut self,
        descriptor: &ExtensionDescriptor,
    ) -> Result<&dyn Extension, ExtensionFailure> {
        let id = descriptor.id.as_str();
        if self.is_registered(id) {
            tracing::debug!(extension = id, "Extension already registered");
            return self
                .extension(id)
                .ok_or_else(|| ExtensionFailure::new(id, FailureReason::UnknownExtension));
        }

        let entry = self.prepare(descriptor).map_err(|reason| {
            let failure = ExtensionFailure::new(id, reason);
            match failure.reason {
                FailureReason::Lifecycle { .. } | FailureReason::Panicked { .. } => {
                    tracing::error!("Failed to register extension: {}", failure)
                }
                _ => tracing::warn!("Extension not registered: {}", failure),
            }
            failure
        })?;

        let index = self.registered.len();
        self.registered.push(entry);
        tracing::info!(extension = id, "Extension registered");
        Ok(self.registered[index].extension.as_ref())
    }

    /// Instantiate, validate, check dependencies and call `register`.
    fn prepare(&mut self, descriptor: &ExtensionDescriptor) -> Result<Entry, FailureReason> {
        let class = descriptor.class();
        let factory = self
            .catalog
            .get(&class)
            .map(Arc::clone)
            .ok_or_else(|| FailureReason::ClassMissing {
                class: class.clone(),
            })?;

        let config = ExtensionConfig::load_dir(&descriptor.path.join(&self.settings.config_dir));
        let ctx = ExtensionContext::new(&descriptor.id, &descriptor.path, config);

        let (mut extension, version, instance_dependencies) = isolate(Phase::Instantiate, || {
            let extension = factory(&ctx).map_err(|source| FailureReason::Lifecycle {
                phase: Phase::Instantiate,
                source,
            })?;
            check_contract(&class, extension.as_ref())?;
            let version = extension.info().version;
            let dependencies = extension.dependencies();
            Ok((extension, version, dependencies))
        })?;

        if extension.id() != descriptor.id {
            tracing::warn!(
                extension = %descriptor.id,
                reported = extension.id(),
                "Extension id differs from its directory name; registering under the directory name"
            );
        }

        let mut dependencies = descriptor.dependencies().clone();
        dependencies.extend(instance_dependencies);
        check_dependencies(&dependencies, self.settings.dependency_policy, |dep| {
            self.registered
                .iter()
                .find(|e| e.id == dep)
                .map(|e| e.version.clone())
        })?;

        let host = &mut self.host;
        isolate(Phase::Register, || {
            extension
                .register(host)
                .map_err(|source| FailureReason::Lifecycle {
                    phase: Phase::Register,
                    source,
                })
        })?;

        Ok(Entry {
            id: descriptor.id.clone(),
            version,
            dependencies,
            extension,
        })
    }

    /// Boot every registered extension in registration order.
    ///
    /// Each extension that boots is added to the enabled set. A failure is
    /// recorded and the loop moves on.
    pub fn boot_extensions(&mut self) -> BatchReport {
        let mut report = BatchReport::new();
        for index in 0..self.registered.len() {
            let id = self.registered[index].id.clone();
            match self.run(index, Phase::Boot) {
                Ok(()) => {
                    self.mark_enabled(&id);
                    tracing::info!(extension = %id, "Extension booted");
                    report.record_success(id);
                }
                Err(reason) => {
                    let failure = ExtensionFailure::new(id, reason);
                    tracing::error!("Failed to boot extension: {}", failure);
                    report.record_failure(failure);
                }
            }
        }
        report
    }

    /// Register everything, then boot everything.
    pub fn start(&mut self) -> StartupReport {
        let registration = self.register_extensions();
        let boot = self.boot_extensions();
        StartupReport { registration, boot }
    }

    /// Boot a registered extension again and mark it enabled.
    ///
    /// Returns `false` for an unknown id or a failing boot.
    pub fn enable(&mut self, id: &str) -> bool {
        self.try_enable(id).is_ok()
    }

    pub fn try_enable(&mut self, id: &str) -> Result<(), ExtensionFailure> {
        let index = self.index_of(id)?;
        self.run(index, Phase::Boot).map_err(|reason| {
            let failure = ExtensionFailure::new(id, reason);
            tracing::error!("Failed to enable extension: {}", failure);
            failure
        })?;
        self.mark_enabled(id);
        tracing::info!(extension = id, "Extension enabled");
        Ok(())
    }

    /// Deactivate a registered extension and drop it from the enabled set.
    ///
    /// Services it registered stay bound. Returns `false` for an unknown id
    /// or a failing deactivation.
    pub fn disable(&mut self, id: &str) -> bool {
        self.try_disable(id).is_ok()
    }

    pub fn try_disable(&mut self, id: &str) -> Result<(), ExtensionFailure> {
        let index = self.index_of(id)?;
        self.run(index, Phase::Deactivate).map_err(|reason| {
            let failure = ExtensionFailure::new(id, reason);
            tracing::error!("Failed to disable extension: {}", failure);
            failure
        })?;
        self.enabled.retain(|e| e != id);
        tracing::info!(extension = id, "Extension disabled");
        Ok(())
    }

    /// Run the extension's teardown and forget it.
    ///
    /// Refused while another registered extension depends on `id`. A failing
    /// teardown leaves the extension registered.
    pub fn uninstall(&mut self, id: &str) -> bool {
        self.try_uninstall(id).is_ok()
    }

    pub fn try_uninstall(&mut self, id: &str) -> Result<(), ExtensionFailure> {
        let index = self.index_of(id)?;

        let dependents = self.dependents_of(id);
        if !dependents.is_empty() {
            let failure = ExtensionFailure::new(id, FailureReason::DependentsRegistered { dependents });
            tracing::warn!("Refusing to uninstall extension: {}", failure);
            return Err(failure);
        }

        self.run(index, Phase::Uninstall).map_err(|reason| {
            let failure = ExtensionFailure::new(id, reason);
            tracing::error!("Failed to uninstall extension: {}", failure);
            failure
        })?;

        self.enabled.retain(|e| e != id);
        self.registered.remove(index);
        tracing::info!(extension = id, "Extension uninstalled");
        Ok(())
    }

    /// Registered ids that declare a dependency on `id`, in registration order.
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        self.registered
            .iter()
            .filter(|e| e.id != id && e.dependencies.contains_key(id))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Registered extensions in registration order.
    pub fn extensions(&self) -> impl Iterator<Item = (&str, &dyn Extension)> + '_ {
        self.registered
            .iter()
            .map(|e| (e.id.as_str(), e.extension.as_ref()))
    }

    /// Enabled extensions in the order they were enabled.
    pub fn enabled_extensions(&self) -> impl Iterator<Item = (&str, &dyn Extension)> + '_ {
        self.enabled
            .iter()
            .filter_map(|id| self.extension(id).map(|ext| (id.as_str(), ext)))
    }

    pub fn registered_ids(&self) -> Vec<&str> {
        self.registered.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn enabled_ids(&self) -> &[String] {
        &self.enabled
    }

    pub fn extension(&self, id: &str) -> Option<&dyn Extension> {
        self.registered
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.extension.as_ref())
    }

    /// Mutable access, e.g. for `set_config`.
    pub fn extension_mut(&mut self, id: &str) -> Option<&mut dyn Extension> {
        let entry = self.registered.iter_mut().find(|e| e.id == id)?;
        Some(entry.extension.as_mut())
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.registered.iter().any(|e| e.id == id)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.iter().any(|e| e == id)
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    fn index_of(&self, id: &str) -> Result<usize, ExtensionFailure> {
        self.registered
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| {
                tracing::warn!(extension = id, "Extension is not registered");
                ExtensionFailure::new(id, FailureReason::UnknownExtension)
            })
    }

    fn mark_enabled(&mut self, id: &str) {
        if !self.is_enabled(id) {
            self.enabled.push(id.to_string());
        }
    }

    /// Call one lifecycle method on the extension at `index`.
    fn run(&mut self, index: usize, phase: Phase) -> Result<(), FailureReason> {
        let Self {
            host, registered, ..
        } = self;
        let extension = &mut registered[index].extension;
        isolate(phase, || {
            let result = match phase {
                Phase::Register => extension.register(host),
                Phase::Boot => extension.boot(host),
                Phase::Deactivate => extension.deactivate(host),
                Phase::Uninstall => extension.uninstall(host),
                Phase::Discover | Phase::Instantiate => Ok(()),
            };
            result.map_err(|source| FailureReason::Lifecycle { phase, source })
        })
    }
}

impl<H: Host + std::fmt::Debug> std::fmt::Debug for ExtensionManager<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionManager")
            .field("host", &self.host)
            .field("settings", &self.settings)
            .field("registered", &self.registered_ids())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Validate an instance the factory produced.
///
/// `info()` is display metadata and is not checked here; its version is only
/// interpreted when a dependent declares a constraint on it.
fn check_contract(class: &str, extension: &dyn Extension) -> Result<(), FailureReason> {
    validate_extension_id(extension.id()).map_err(|e| FailureReason::ContractViolation {
        class: class.to_string(),
        reason: e.to_string(),
    })
}

/// Run extension code, turning a panic into a failure.
fn isolate<T>(
    phase: Phase,
    f: impl FnOnce() -> Result<T, FailureReason>,
) -> Result<T, FailureReason> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(FailureReason::Panicked {
            phase,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
