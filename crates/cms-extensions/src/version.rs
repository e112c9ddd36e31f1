//! Version constraint parsing and checking for extension dependencies.
//!
//! Manifests and [`Extension::dependencies`](crate::Extension::dependencies)
//! declare constraints as strings. Supported forms:
//!
//! - comparison specifiers: `>=1.0`, `<2.0.0`, `==1.2.3`, `!=1.1`
//! - comma-separated compounds, all of which must match: `>=1.0,<2.0`
//! - bare versions, treated as `==`: `1.2.0`
//! - `*` (or an empty string), matching every version
//! - caret and tilde requirements, delegated to [`semver::VersionReq`]: `^1.2`, `~1.4`
//!
//! Versions may omit the patch component (`1.2` is read as `1.2.0`).
//!
//! # Examples
//!
//! ```
//! use cms_extensions::version::VersionConstraint;
//!
//! let constraint = VersionConstraint::parse(">=1.0,<2.0").unwrap();
//! assert!(constraint.satisfies("1.4.2"));
//! assert!(!constraint.satisfies("2.0.0"));
//!
//! let caret = VersionConstraint::parse("^1.2").unwrap();
//! assert!(caret.satisfies("1.9.0"));
//! assert!(!caret.satisfies("2.0.0"));
//! ```

use crate::error::{Error, Result};

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// One comma-separated piece of a constraint.
#[derive(Debug, Clone)]
enum Specifier {
    Compare {
        op: CompareOp,
        version: semver::Version,
    },
    Requirement(semver::VersionReq),
    Any,
}

impl Specifier {
    fn matches(&self, candidate: &semver::Version) -> bool {
        match self {
            Self::Compare { op, version } => match op {
                CompareOp::Gte => candidate >= version,
                CompareOp::Gt => candidate > version,
                CompareOp::Lte => candidate <= version,
                CompareOp::Lt => candidate < version,
                CompareOp::Eq => candidate == version,
                CompareOp::Ne => candidate != version,
            },
            Self::Requirement(req) => req.matches(candidate),
            Self::Any => true,
        }
    }
}

/// A parsed version constraint that can be checked against concrete versions.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    specifiers: Vec<Specifier>,
    /// The original constraint string for display.
    raw: String,
}

impl VersionConstraint {
    /// Parse a version constraint string.
    pub fn parse(constraint: &str) -> Result<Self> {
        let raw = constraint.to_string();
        if constraint.trim().is_empty() {
            return Ok(Self::any_with_raw(raw));
        }

        let mut specifiers = Vec::new();
        for part in constraint.split(',').map(str::trim) {
            if part.is_empty() {
                continue;
            }
            specifiers.push(parse_specifier(part)?);
        }

        if specifiers.is_empty() {
            return Err(Error::VersionConstraintParse {
                constraint: raw,
                reason: "no specifiers".to_string(),
            });
        }

        Ok(Self { specifiers, raw })
    }

    /// A constraint that every version satisfies.
    pub fn any() -> Self {
        Self::any_with_raw("*".to_string())
    }

    fn any_with_raw(raw: String) -> Self {
        Self {
            specifiers: vec![Specifier::Any],
            raw,
        }
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Returns `false` if the version string cannot be parsed, unless the
    /// constraint accepts any version.
    pub fn satisfies(&self, version: &str) -> bool {
        if self.is_any() {
            return true;
        }
        match normalize_version(version) {
            Ok(parsed) => self.satisfies_version(&parsed),
            Err(_) => false,
        }
    }

    /// Check if a `semver::Version` satisfies this constraint.
    pub fn satisfies_version(&self, version: &semver::Version) -> bool {
        self.specifiers.iter().all(|spec| spec.matches(version))
    }

    /// Whether this constraint accepts every version.
    pub fn is_any(&self) -> bool {
        self.specifiers.iter().all(|spec| matches!(spec, Specifier::Any))
    }

    /// Return the original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a single specifier like `>=1.2`, `^2.0` or `*`.
fn parse_specifier(s: &str) -> Result<Specifier> {
    if s == "*" {
        return Ok(Specifier::Any);
    }

    if s.starts_with('^') || s.starts_with('~') {
        let req = semver::VersionReq::parse(s).map_err(|e| Error::VersionConstraintParse {
            constraint: s.to_string(),
            reason: e.to_string(),
        })?;
        return Ok(Specifier::Requirement(req));
    }

    let (op, version_str) = if let Some(rest) = s.strip_prefix(">=") {
        (CompareOp::Gte, rest)
    } else if let Some(rest) = s.strip_prefix("<=") {
        (CompareOp::Lte, rest)
    } else if let Some(rest) = s.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = s.strip_prefix("==") {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = s.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = s.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else {
        // Bare version implies ==
        (CompareOp::Eq, s)
    };

    let version_str = version_str.trim();
    let version = normalize_version(version_str).map_err(|_| Error::VersionConstraintParse {
        constraint: s.to_string(),
        reason: format!("invalid version: {version_str}"),
    })?;

    Ok(Specifier::Compare { op, version })
}

/// Normalize a version string to semver by appending `.0` for a missing patch.
///
/// - `"1.2"` -> `1.2.0`
/// - `"1.2.3"` -> `1.2.3`
/// - `"1"` -> error
pub(crate) fn normalize_version(s: &str) -> std::result::Result<semver::Version, String> {
    let s = s.trim();

    if let Ok(v) = semver::Version::parse(s) {
        return Ok(v);
    }

    let with_patch = format!("{s}.0");
    semver::Version::parse(&with_patch).map_err(|e| format!("invalid version '{s}': {e}"))
}
