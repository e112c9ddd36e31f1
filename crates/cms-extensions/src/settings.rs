//! Manager settings loaded from a `cms.toml` `[extensions]` table.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{CONFIG_DIRNAME, ENTRY_POINT_FILENAME, MANIFEST_FILENAME};

/// How declared dependencies are checked during registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyPolicy {
    /// A dependency is met only if it is already registered when the
    /// dependent is processed. Constraints are not evaluated, so the
    /// outcome depends on processing order.
    #[default]
    RegistrationOrder,
    /// Discovered extensions are ordered dependency-first before
    /// registration. Cycles are rejected and version constraints are
    /// checked against the registered dependency.
    Resolved,
}

/// Settings for [`ExtensionManager`](crate::ExtensionManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Directory scanned for extension subdirectories.
    pub extensions_dir: PathBuf,
    /// Manifest file name inside each extension directory.
    pub manifest_file: String,
    /// Entry point file name inside each extension directory.
    pub entry_point: String,
    /// Per-extension configuration directory name.
    pub config_dir: String,
    /// Create `extensions_dir` when it does not exist.
    pub create_missing_dir: bool,
    pub dependency_policy: DependencyPolicy,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            extensions_dir: PathBuf::from("extensions"),
            manifest_file: MANIFEST_FILENAME.to_string(),
            entry_point: ENTRY_POINT_FILENAME.to_string(),
            config_dir: CONFIG_DIRNAME.to_string(),
            create_missing_dir: true,
            dependency_policy: DependencyPolicy::default(),
        }
    }
}

/// Wrapper matching the layout of `cms.toml`.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    extensions: ManagerSettings,
}

impl ManagerSettings {
    /// Default settings rooted at `extensions_dir`.
    pub fn new(extensions_dir: impl Into<PathBuf>) -> Self {
        Self {
            extensions_dir: extensions_dir.into(),
            ..Self::default()
        }
    }

    /// Builder-style override of the dependency policy.
    pub fn with_policy(mut self, policy: DependencyPolicy) -> Self {
        self.dependency_policy = policy;
        self
    }

    /// Parse settings from the `[extensions]` table of a TOML document.
    ///
    /// Missing keys fall back to defaults. `origin` is used for errors and to
    /// resolve a relative `extensions_dir`.
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self> {
        let file: SettingsFile = toml::from_str(content).map_err(|source| Error::SettingsParse {
            path: origin.to_path_buf(),
            source,
        })?;
        let mut settings = file.extensions;
        if settings.extensions_dir.is_relative() {
            if let Some(base) = origin.parent() {
                settings.extensions_dir = base.join(&settings.extensions_dir);
            }
        }
        Ok(settings)
    }

    /// Read settings from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&content, path)
    }

    /// Directory of one extension.
    pub fn extension_path(&self, id: &str) -> PathBuf {
        self.extensions_dir.join(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let settings = ManagerSettings::default();
        assert_eq!(settings.extensions_dir, PathBuf::from("extensions"));
        assert_eq!(settings.manifest_file, "extension.json");
        assert_eq!(settings.entry_point, "extension.rs");
        assert_eq!(settings.config_dir, "config");
        assert!(settings.create_missing_dir);
        assert_eq!(settings.dependency_policy, DependencyPolicy::RegistrationOrder);
    }

    #[test]
    fn test_from_toml_partial_overrides() {
        let toml_str = r#"
[extensions]
extensions_dir = "plugins"
dependency_policy = "resolved"
"#;
        let settings = ManagerSettings::from_toml(toml_str, Path::new("/srv/cms/cms.toml")).unwrap();
        assert_eq!(settings.extensions_dir, PathBuf::from("/srv/cms/plugins"));
        assert_eq!(settings.dependency_policy, DependencyPolicy::Resolved);
        assert_eq!(settings.manifest_file, "extension.json");
    }

    #[test]
    fn test_from_toml_absolute_dir_kept() {
        let toml_str = "[extensions]\nextensions_dir = \"/opt/extensions\"\n";
        let settings = ManagerSettings::from_toml(toml_str, Path::new("/srv/cms/cms.toml")).unwrap();
        assert_eq!(settings.extensions_dir, PathBuf::from("/opt/extensions"));
    }

    #[test]
    fn test_from_toml_missing_table_is_default() {
        let settings = ManagerSettings::from_toml("", Path::new("cms.toml")).unwrap();
        assert_eq!(settings.manifest_file, ManagerSettings::default().manifest_file);
    }

    #[test]
    fn test_from_toml_unknown_policy_rejected() {
        let toml_str = "[extensions]\ndependency_policy = \"eager\"\n";
        let err = ManagerSettings::from_toml(toml_str, Path::new("cms.toml")).unwrap_err();
        assert!(matches!(err, Error::SettingsParse { .. }));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = ManagerSettings::from_path(Path::new("/nonexistent/cms.toml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
