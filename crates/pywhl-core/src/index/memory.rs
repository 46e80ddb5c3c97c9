//! In-memory index.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pywhl_schema::{ArtifactDescriptor, PackageMetadata, PackageName, Version};

use super::{IndexError, MetadataSource};

#[derive(Debug, Default)]
struct Release {
    version: String,
    requires: Vec<String>,
    artifacts: Vec<ArtifactDescriptor>,
}

#[derive(Debug, Default)]
struct Package {
    display_name: String,
    summary: Option<String>,
    releases: Vec<Release>,
}

/// A fixed set of packages held in memory, answering like a real index.
///
/// `latest_version` is the highest parseable version, falling back to the
/// most recently added one when none parse.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    packages: HashMap<PackageName, Package>,
    requests: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) one release of a package.
    pub fn add_release(
        &mut self,
        name: &str,
        version: &str,
        requires: &[&str],
        artifacts: &[ArtifactDescriptor],
    ) -> &mut Self {
        let package = self.packages.entry(PackageName::new(name)).or_default();
        if package.display_name.is_empty() {
            package.display_name = name.to_string();
        }
        let release = Release {
            version: version.to_string(),
            requires: requires.iter().map(|r| (*r).to_string()).collect(),
            artifacts: artifacts.to_vec(),
        };
        match package.releases.iter_mut().find(|r| r.version == version) {
            Some(existing) => *existing = release,
            None => package.releases.push(release),
        }
        self
    }

    /// Convenience for releases with no files and no requirements.
    pub fn add_versions(&mut self, name: &str, versions: &[&str]) -> &mut Self {
        for v in versions {
            self.add_release(name, v, &[], &[]);
        }
        self
    }

    pub fn set_summary(&mut self, name: &str, summary: &str) -> &mut Self {
        if let Some(package) = self.packages.get_mut(&PackageName::new(name)) {
            package.summary = Some(summary.to_string());
        }
        self
    }

    /// Number of metadata lookups served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

fn latest(releases: &[Release]) -> Option<&Release> {
    releases
        .iter()
        .filter_map(|r| Version::parse_release(&r.version).ok().map(|v| (v, r)))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, r)| r)
        .or_else(|| releases.last())
}

#[async_trait]
impl MetadataSource for MemoryIndex {
    async fn package_metadata(
        &self,
        name: &PackageName,
        version: Option<&str>,
    ) -> Result<PackageMetadata, IndexError> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let package = self
            .packages
            .get(name)
            .ok_or_else(|| IndexError::not_found(name, version))?;
        let described = match version {
            Some(v) => package.releases.iter().find(|r| r.version == v),
            None => latest(&package.releases),
        }
        .ok_or_else(|| IndexError::not_found(name, version))?;

        Ok(PackageMetadata {
            name: package.display_name.clone(),
            latest_version: described.version.clone(),
            available_versions: package.releases.iter().map(|r| r.version.clone()).collect(),
            releases: package
                .releases
                .iter()
                .map(|r| (r.version.clone(), r.artifacts.clone()))
                .collect(),
            requires: described.requires.clone(),
            summary: package.summary.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_is_highest_version() {
        let mut index = MemoryIndex::new();
        index.add_versions("dep", &["1.5.0", "2.0.0", "0.9.0"]);
        let meta = index.package_metadata(&PackageName::new("dep"), None).await.unwrap();
        assert_eq!(meta.latest_version, "2.0.0");
        assert_eq!(meta.available_versions, vec!["1.5.0", "2.0.0", "0.9.0"]);
    }

    #[tokio::test]
    async fn test_specific_version_requirements() {
        let mut index = MemoryIndex::new();
        index
            .add_release("pkg", "1.2.0", &["dep>=1.0.0,<2.0.0"], &[])
            .add_release("pkg", "1.3.0", &[], &[]);
        let meta = index
            .package_metadata(&PackageName::new("pkg"), Some("1.2.0"))
            .await
            .unwrap();
        assert_eq!(meta.requires, vec!["dep>=1.0.0,<2.0.0"]);

        let err = index
            .package_metadata(&PackageName::new("pkg"), Some("9.9.9"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(index.requests(), 2);
    }
}
