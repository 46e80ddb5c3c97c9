//! Package metadata sources.
//!
//! The resolver and the selection step only see [`MetadataSource`]. The
//! concrete sources are the PyPI JSON client, a priority-ordered chain of
//! several indexes, and an in-memory index used by tests and offline runs.

pub mod chain;
pub mod memory;
pub mod pypi;

use async_trait::async_trait;
use pywhl_schema::{PackageMetadata, PackageName};
use thiserror::Error;

pub use chain::RepositoryChain;
pub use memory::MemoryIndex;
pub use pypi::PyPiClient;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("package '{name}' not found{}", version.as_ref().map(|v| format!(" (version {v})")).unwrap_or_default())]
    NotFound {
        name: String,
        version: Option<String>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("index returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("malformed index response for '{name}': {reason}")]
    Decode { name: String, reason: String },
}

impl IndexError {
    pub fn not_found(name: &PackageName, version: Option<&str>) -> Self {
        Self::NotFound {
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Anything that can describe a package: its versions, files and requirements.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Metadata for `name`. With `version`, `requires` and `latest_version`
    /// describe that version; without it they describe the latest release.
    async fn package_metadata(
        &self,
        name: &PackageName,
        version: Option<&str>,
    ) -> Result<PackageMetadata, IndexError>;
}

#[async_trait]
impl<T: MetadataSource + ?Sized> MetadataSource for std::sync::Arc<T> {
    async fn package_metadata(
        &self,
        name: &PackageName,
        version: Option<&str>,
    ) -> Result<PackageMetadata, IndexError> {
        (**self).package_metadata(name, version).await
    }
}
