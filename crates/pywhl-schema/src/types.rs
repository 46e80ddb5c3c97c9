//! Package names and the fixed metadata shapes read from an index.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;

use crate::hash::Sha256Digest;

/// A normalized package name.
///
/// Index names compare case-insensitively and treat runs of `-`, `_` and `.`
/// as a single `-`, so `Foo_Bar`, `foo.bar` and `foo-bar` are one package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name, normalizing the input.
    pub fn new(name: &str) -> Self {
        Self(normalize(name))
    }

    /// Return the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('-');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == normalize(other)
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == normalize(other)
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

/// One downloadable file from an index release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// File name as published (e.g. `six-1.16.0-py2.py3-none-any.whl`).
    pub filename: String,

    /// Download URL.
    pub url: String,

    /// Size in bytes, when the index reports it.
    #[serde(default)]
    pub size: Option<u64>,

    /// Published SHA256 digest, when the index reports one.
    #[serde(default)]
    pub sha256: Option<Sha256Digest>,

    /// Withdrawn by the publisher; still downloadable but never preferred.
    #[serde(default)]
    pub yanked: bool,
}

impl ArtifactDescriptor {
    /// A descriptor with only the required fields set.
    pub fn new(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
            size: None,
            sha256: None,
            yanked: false,
        }
    }

    /// Whether the file name looks like a wheel at all.
    pub fn is_wheel(&self) -> bool {
        self.filename.ends_with(".whl")
    }
}

/// Fixed-shape view of what an index knows about a package.
///
/// Version strings are kept raw: indexes publish versions this tool cannot
/// order, and callers decide how to treat them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Name as the index spells it.
    pub name: String,

    /// Latest version reported by the index.
    pub latest_version: String,

    /// Every published version.
    #[serde(default)]
    pub available_versions: Vec<String>,

    /// Files per version.
    #[serde(default)]
    pub releases: BTreeMap<String, Vec<ArtifactDescriptor>>,

    /// Declared requirement strings for the described version.
    #[serde(default)]
    pub requires: Vec<String>,

    /// One-line summary, when published.
    #[serde(default)]
    pub summary: Option<String>,
}

impl PackageMetadata {
    /// Files for one version, empty when the index lists none.
    pub fn artifacts(&self, version: &str) -> &[ArtifactDescriptor] {
        self.releases.get(version).map_or(&[], Vec::as_slice)
    }
}
