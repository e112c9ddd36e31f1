//! Thread-safe handle for callers that enable and disable extensions
//! concurrently, such as an admin API.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::host::Host;
use crate::manager::ExtensionManager;
use crate::report::{BatchReport, ExtensionFailure};

/// Cloneable, mutex-guarded [`ExtensionManager`].
///
/// Every call holds the lock for its whole duration, so the registered and
/// enabled sets are never observed half-updated. A lock poisoned by a
/// panicking caller is recovered: the manager itself never leaves its sets
/// inconsistent across a panic.
pub struct SharedExtensionManager<H: Host> {
    inner: Arc<Mutex<ExtensionManager<H>>>,
}

impl<H: Host> Clone for SharedExtensionManager<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: Host> SharedExtensionManager<H> {
    pub fn new(manager: ExtensionManager<H>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExtensionManager<H>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the manager.
    pub fn with<R>(&self, f: impl FnOnce(&mut ExtensionManager<H>) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    pub fn register_extensions(&self) -> BatchReport {
        self.lock().register_extensions()
    }

    pub fn boot_extensions(&self) -> BatchReport {
        self.lock().boot_extensions()
    }

    pub fn enable(&self, id: &str) -> bool {
        self.lock().enable(id)
    }

    pub fn disable(&self, id: &str) -> bool {
        self.lock().disable(id)
    }

    pub fn try_enable(&self, id: &str) -> Result<(), ExtensionFailure> {
        self.lock().try_enable(id)
    }

    pub fn try_disable(&self, id: &str) -> Result<(), ExtensionFailure> {
        self.lock().try_disable(id)
    }

    pub fn uninstall(&self, id: &str) -> bool {
        self.lock().uninstall(id)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.lock().is_enabled(id)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.lock().is_registered(id)
    }

    /// Snapshot of the enabled ids.
    pub fn enabled_ids(&self) -> Vec<String> {
        self.lock().enabled_ids().to_vec()
    }

    /// Snapshot of the registered ids.
    pub fn registered_ids(&self) -> Vec<String> {
        self.lock()
            .registered_ids()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

impl<H: Host> From<ExtensionManager<H>> for SharedExtensionManager<H> {
    fn from(manager: ExtensionManager<H>) -> Self {
        Self::new(manager)
    }
}
