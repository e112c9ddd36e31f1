//! Catalog of extension types the host knows how to construct.
//!
//! Manifests and the naming convention refer to an implementing type by a
//! class string. The catalog maps that string to a factory, so the set of
//! constructible extensions is fixed when the host starts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::extension::{Extension, ExtensionContext, LifecycleError};

/// Constructs one extension instance from its discovery context.
pub type ExtensionFactory =
    Arc<dyn Fn(&ExtensionContext) -> Result<Box<dyn Extension>, LifecycleError> + Send + Sync>;

/// Class string -> factory.
#[derive(Clone, Default)]
pub struct ExtensionCatalog {
    factories: HashMap<String, ExtensionFactory>,
}

impl ExtensionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding the extensions shipped with this crate.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        crate::builtin::register_builtins(&mut catalog);
        catalog
    }

    /// Register an infallible factory under `class`.
    ///
    /// Registering the same class twice replaces the earlier factory.
    pub fn register<F>(&mut self, class: impl Into<String>, factory: F)
    where
        F: Fn(&ExtensionContext) -> Box<dyn Extension> + Send + Sync + 'static,
    {
        self.register_fallible(class, move |ctx| Ok(factory(ctx)));
    }

    /// Register a factory that may refuse to construct the extension.
    pub fn register_fallible<F>(&mut self, class: impl Into<String>, factory: F)
    where
        F: Fn(&ExtensionContext) -> Result<Box<dyn Extension>, LifecycleError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(class.into(), Arc::new(factory));
    }

    /// Look up the factory for `class`.
    pub fn get(&self, class: &str) -> Option<&ExtensionFactory> {
        self.factories.get(class)
    }

    /// Construct an instance of `class`, or `None` if the class is unknown.
    pub fn instantiate(
        &self,
        class: &str,
        ctx: &ExtensionContext,
    ) -> Option<Result<Box<dyn Extension>, LifecycleError>> {
        self.get(class).map(|factory| factory(ctx))
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// All registered class strings (sorted).
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.factories.keys().cloned().collect();
        classes.sort();
        classes
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ExtensionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionCatalog")
            .field("classes", &self.classes())
            .finish()
    }
}
