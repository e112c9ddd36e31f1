//! Per-extension configuration addressed by dot-separated key paths.
//!
//! Configuration files live in `<extension>/config/`. Each `*.toml` or
//! `*.json` file contributes one top-level key named after its file stem, so
//! `config/mail.toml` containing `driver = "smtp"` is read back with
//! `config.get("mail.driver")`.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Hierarchical configuration owned by one extension instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionConfig {
    values: Map<String, Value>,
}

impl ExtensionConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Load every config file in `dir`, keyed by file stem.
    ///
    /// A missing directory yields an empty configuration. Files that fail to
    /// parse are skipped with a warning so one broken file does not hide the
    /// rest. Files are read in name order.
    pub fn load_dir(dir: &Path) -> Self {
        let mut config = Self::new();
        if !dir.is_dir() {
            return config;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %dir.display(), "Cannot read extension config directory: {}", e);
                return config;
            }
        };

        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        for path in files {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match load_file(&path) {
                Ok(Some(value)) => {
                    config.values.insert(stem.to_string(), value);
                }
                Ok(None) => {
                    tracing::debug!(path = %path.display(), "Ignoring non-config file");
                }
                Err(e) => {
                    tracing::warn!("Skipping extension config file: {}", e);
                }
            }
        }

        config
    }

    /// Look up a value by dot-separated key path.
    ///
    /// Path segments index into objects by key and into arrays by position.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Look up a value, falling back to `default` when the path is absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).cloned().unwrap_or(default)
    }

    /// Set a value by dot-separated key path.
    ///
    /// Missing intermediate objects are created. A segment that indexes an
    /// existing array (an in-range position, or one past the end) writes that
    /// element in place, so sibling elements survive. Any other intermediate
    /// value that is not an object is replaced by one.
    pub fn set(&mut self, key: &str, value: Value) {
        let mut segments = key.split('.');
        let Some(first) = segments.next() else {
            return;
        };
        let rest: Vec<&str> = segments.collect();
        let slot = self.values.entry(first.to_string()).or_insert(Value::Null);
        set_path(slot, &rest, value);
    }

    /// Whether a value exists at the key path.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The whole configuration as a JSON object.
    pub fn all(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The whole configuration as an owned JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn set_path(target: &mut Value, segments: &[&str], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if let Value::Array(items) = target {
        if let Ok(index) = segment.parse::<usize>() {
            if index == items.len() {
                items.push(Value::Null);
            }
            if let Some(item) = items.get_mut(index) {
                set_path(item, rest, value);
                return;
            }
        }
    }

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let child = map.entry(segment.to_string()).or_insert(Value::Null);
        set_path(child, rest, value);
    }
}

/// Parse one config file. Returns `Ok(None)` for unsupported extensions.
fn load_file(path: &Path) -> Result<Option<Value>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let parse_err = |reason: String| Error::ConfigParse {
        path: path.to_path_buf(),
        reason,
    };

    let value = match extension.as_str() {
        "toml" => {
            let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            let table: toml::Table = toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
            serde_json::to_value(table).map_err(|e| parse_err(e.to_string()))?
        }
        "json" => {
            let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            let value: Value =
                serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
            if !value.is_object() {
                return Err(parse_err("top level must be an object".to_string()));
            }
            value
        }
        _ => return Ok(None),
    };

    Ok(Some(value))
}
