use std::path::PathBuf;

/// Errors that can occur while reading extension metadata and settings.
///
/// Failures of individual extensions during registration or boot are not
/// reported through this type; see [`crate::report::ExtensionFailure`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to parse an extension manifest.
    #[error("failed to parse extension manifest at {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Extension manifest file not found at the expected path.
    #[error("extension manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// Manifest parsed but declares invalid values.
    #[error("invalid extension manifest at {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    /// Invalid version constraint string.
    #[error("invalid version constraint '{constraint}': {reason}")]
    VersionConstraintParse { constraint: String, reason: String },

    /// Invalid extension name.
    #[error("invalid extension name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Failed to serialize extension manifest.
    #[error("failed to serialize extension manifest: {0}")]
    ManifestSerialize(String),

    /// Failed to parse manager settings TOML.
    #[error("failed to parse settings at {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Failed to parse one per-extension config file.
    #[error("failed to parse extension config at {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    /// Dependency graph contains a cycle.
    #[error("dependency cycle detected between: {}", participants.join(", "))]
    DependencyCycle { participants: Vec<String> },

    /// I/O error reading extension files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
