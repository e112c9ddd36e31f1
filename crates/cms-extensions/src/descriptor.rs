//! Static description of one discovered extension.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::extension::Dependencies;
use crate::manifest::{ExtensionManifest, class_name_for};

/// An extension directory that passed discovery.
///
/// Immutable once built; the manager instantiates from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionDescriptor {
    /// Directory name, unique within the extensions directory.
    pub id: String,
    /// Extension directory.
    pub path: PathBuf,
    pub manifest: ExtensionManifest,
}

impl ExtensionDescriptor {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, manifest: ExtensionManifest) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            manifest,
        }
    }

    /// Implementing-type reference: the manifest `class`, or the naming
    /// convention applied to the directory name.
    pub fn class(&self) -> String {
        self.manifest
            .class
            .clone()
            .unwrap_or_else(|| class_name_for(&self.id))
    }

    /// Display name, falling back to the id.
    pub fn name(&self) -> &str {
        self.manifest.name.as_deref().unwrap_or(&self.id)
    }

    pub fn version(&self) -> Option<&str> {
        self.manifest.version.as_deref()
    }

    /// Dependencies declared in the manifest.
    pub fn dependencies(&self) -> &Dependencies {
        &self.manifest.dependencies
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_falls_back_to_convention() {
        let descriptor =
            ExtensionDescriptor::new("hello-world", "/ext/hello-world", ExtensionManifest::default());
        assert_eq!(descriptor.class(), "HelloWorldExtension");
        assert_eq!(descriptor.name(), "hello-world");
        assert_eq!(descriptor.version(), None);
    }

    #[test]
    fn test_explicit_class_and_name() {
        let manifest = ExtensionManifest {
            class: Some("GreeterExtension".to_string()),
            name: Some("Greeter".to_string()),
            ..ExtensionManifest::default()
        };
        let descriptor = ExtensionDescriptor::new("hello-world", "/ext/hello-world", manifest);
        assert_eq!(descriptor.class(), "GreeterExtension");
        assert_eq!(descriptor.name(), "Greeter");
    }
}
