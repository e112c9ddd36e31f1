//! Extension manifest parsing for `extension.json` files.
//!
//! A manifest declares the implementing type, display metadata and the
//! dependencies of one extension. Every field is optional: an empty object
//! is a valid manifest, and the implementing type then falls back to the
//! naming convention in [`class_name_for`].
//!
//! # Example JSON
//!
//! ```json
//! {
//!     "class": "HelloWorldExtension",
//!     "name": "Hello World",
//!     "version": "1.0.0",
//!     "description": "A simple hello world extension",
//!     "author": "KeenDigit Team",
//!     "dependencies": { "base-theme": ">=1.0" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::version::VersionConstraint;

/// Suffix appended to the title-cased directory name by the naming convention.
pub const CLASS_SUFFIX: &str = "Extension";

/// Complete extension manifest loaded from `extension.json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ExtensionManifest {
    /// Explicit implementing-type reference, looked up in the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Version string. Display metadata; see [`semver`](Self::semver).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Author or vendor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Declared dependencies: extension id -> version constraint. An empty
    /// JSON array or `null` reads as no dependencies.
    #[serde(
        default,
        deserialize_with = "deserialize_dependencies",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub dependencies: BTreeMap<String, String>,
    /// Any other keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExtensionManifest {
    /// Parse a manifest from a JSON string.
    ///
    /// `origin` is only used for error messages.
    pub fn from_json(content: &str, origin: &Path) -> Result<Self> {
        let manifest: Self = serde_json::from_str(content).map_err(|source| Error::ManifestParse {
            path: origin.to_path_buf(),
            source,
        })?;
        manifest.validate(origin)?;
        Ok(manifest)
    }

    /// Read and parse a manifest from a file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ManifestNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&content, path)
    }

    /// Serialize the manifest back to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::ManifestSerialize(e.to_string()))
    }

    /// The parsed version, if one is declared and reads as semver.
    pub fn semver(&self) -> Option<semver::Version> {
        self.version
            .as_deref()
            .and_then(|v| crate::version::normalize_version(v).ok())
    }

    /// Parse every declared dependency constraint.
    pub fn dependency_constraints(&self) -> Result<Vec<(String, VersionConstraint)>> {
        self.dependencies
            .iter()
            .map(|(id, raw)| Ok((id.clone(), VersionConstraint::parse(raw)?)))
            .collect()
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        if let Some(ref class) = self.class {
            if class.trim().is_empty() {
                return Err(Error::InvalidManifest {
                    path: origin.to_path_buf(),
                    reason: "class must not be empty when declared".to_string(),
                });
            }
        }

        if let Some(id) = self.dependencies.keys().find(|id| id.trim().is_empty()) {
            return Err(Error::InvalidManifest {
                path: origin.to_path_buf(),
                reason: format!("dependency id must not be empty (got {id:?})"),
            });
        }

        Ok(())
    }
}

fn deserialize_dependencies<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{Error as _, IgnoredAny};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Map(BTreeMap<String, String>),
        List(Vec<IgnoredAny>),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(BTreeMap::new()),
        Some(Raw::Map(map)) => Ok(map),
        Some(Raw::List(items)) if items.is_empty() => Ok(BTreeMap::new()),
        Some(Raw::List(_)) => Err(D::Error::custom(
            "dependencies must be an object mapping extension ids to version constraints",
        )),
    }
}

/// Derive the implementing-type reference for a directory name.
///
/// Splits on `-`, `_`, `.` and whitespace, upper-cases the first letter of
/// each part, joins them and appends [`CLASS_SUFFIX`]:
/// `hello-world` becomes `HelloWorldExtension`.
pub fn class_name_for(directory: &str) -> String {
    let mut class = String::with_capacity(directory.len() + CLASS_SUFFIX.len());
    for part in directory
        .split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|p| !p.is_empty())
    {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            class.extend(first.to_uppercase());
            class.push_str(chars.as_str());
        }
    }
    class.push_str(CLASS_SUFFIX);
    class
}

/// Check an extension id (directory name) for characters the manager accepts.
pub fn validate_extension_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidName {
            name: id.to_string(),
            reason: "extension id must not be empty".to_string(),
        });
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(Error::InvalidName {
            name: id.to_string(),
            reason: "extension id must contain only alphanumeric characters, hyphens, underscores or dots".to_string(),
        });
    }
    if id.starts_with('.') {
        return Err(Error::InvalidName {
            name: id.to_string(),
            reason: "extension id must not start with a dot".to_string(),
        });
    }
    Ok(())
}
