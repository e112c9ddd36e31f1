//! [`TestExtensions`] builder for extension-directory test scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use cms_extensions::{
    DependencyPolicy, ENTRY_POINT_FILENAME, ExtensionCatalog, ExtensionManager,
    MANIFEST_FILENAME, ManagerSettings, MemoryHost,
};
use tempfile::TempDir;

use crate::scripted::{Script, ScriptedExtension};

/// A temporary project directory holding an `extensions/` tree, plus a
/// catalog the test fills alongside it.
///
/// # Example
///
/// ```rust,no_run
/// use cms_test_utils::{Script, TestExtensions};
///
/// let mut fixture = TestExtensions::new();
/// fixture.add_scripted("blog", "{}", Script::default());
/// let mut manager = fixture.manager();
/// assert!(manager.register_extensions().is_clean());
/// ```
pub struct TestExtensions {
    temp_dir: TempDir,
    catalog: ExtensionCatalog,
}

impl Default for TestExtensions {
    fn default() -> Self {
        Self::new()
    }
}

impl TestExtensions {
    /// Create an empty project directory. The `extensions/` subdirectory is
    /// not created until the first extension is added.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            catalog: ExtensionCatalog::with_builtins(),
        }
    }

    /// Project root (the parent of `extensions/`).
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The extensions directory.
    pub fn extensions_dir(&self) -> PathBuf {
        self.root().join("extensions")
    }

    /// Directory of one extension.
    pub fn path_of(&self, id: &str) -> PathBuf {
        self.extensions_dir().join(id)
    }

    /// Write a complete extension directory: entry point and manifest.
    pub fn add(&mut self, id: &str, manifest_json: &str) -> &mut Self {
        let dir = self.path_of(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(ENTRY_POINT_FILENAME), format!("// {id}\n")).unwrap();
        fs::write(dir.join(MANIFEST_FILENAME), manifest_json).unwrap();
        self
    }

    /// Write an extension directory and register a [`ScriptedExtension`]
    /// for it under the conventional class name.
    pub fn add_scripted(&mut self, id: &str, manifest_json: &str, script: Script) -> &mut Self {
        self.add(id, manifest_json);
        ScriptedExtension::add_to(&mut self.catalog, id, script);
        self
    }

    /// A directory with an entry point but no manifest.
    pub fn add_without_manifest(&mut self, id: &str) -> &mut Self {
        let dir = self.path_of(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(ENTRY_POINT_FILENAME), "").unwrap();
        self
    }

    /// A directory with a manifest but no entry point.
    pub fn add_without_entry_point(&mut self, id: &str) -> &mut Self {
        let dir = self.path_of(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILENAME), "{}").unwrap();
        self
    }

    /// Write `config/<file_name>` inside an extension directory.
    pub fn add_config_file(&mut self, id: &str, file_name: &str, content: &str) -> &mut Self {
        let dir = self.path_of(id).join("config");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file_name), content).unwrap();
        self
    }

    /// Write `cms.toml` in the project root and return its path.
    pub fn write_settings(&self, content: &str) -> PathBuf {
        let path = self.root().join("cms.toml");
        fs::write(&path, content).unwrap();
        path
    }

    pub fn catalog(&self) -> &ExtensionCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut ExtensionCatalog {
        &mut self.catalog
    }

    /// Settings pointing at this fixture's extensions directory.
    pub fn settings(&self) -> ManagerSettings {
        ManagerSettings::new(self.extensions_dir())
    }

    /// A manager over a non-console [`MemoryHost`] with the default policy.
    pub fn manager(&self) -> ExtensionManager<MemoryHost> {
        self.manager_with(DependencyPolicy::RegistrationOrder)
    }

    pub fn manager_with(&self, policy: DependencyPolicy) -> ExtensionManager<MemoryHost> {
        ExtensionManager::new(
            MemoryHost::new(),
            self.settings().with_policy(policy),
            self.catalog.clone(),
        )
    }

    /// Assert that `path` (relative to the project root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the file at `path` (relative to root) contains `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, path: &str, content: &str) {
        let full_path = self.root().join(path);
        let file_content = fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()));
        assert!(
            file_content.contains(content),
            "File {} does not contain expected content.\nExpected: {}\nActual: {}",
            full_path.display(),
            content,
            file_content
        );
    }
}
