//! Several indexes consulted in priority order.

use async_trait::async_trait;
use pywhl_schema::{PackageMetadata, PackageName};

use super::{IndexError, MetadataSource, PyPiClient};
use crate::config::ResolvedRepository;

struct Entry {
    name: String,
    priority: u32,
    source: Box<dyn MetadataSource>,
}

/// The first source that knows a package answers for it. A source failing
/// with anything other than not-found is logged and the next one is tried;
/// that error is returned only if no later source answers.
#[derive(Default)]
pub struct RepositoryChain {
    entries: Vec<Entry>,
}

impl RepositoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build PyPI clients for every configured repository.
    ///
    /// # Errors
    ///
    /// Fails if an HTTP client cannot be constructed.
    pub fn from_repositories(repos: &[ResolvedRepository]) -> Result<Self, IndexError> {
        let mut chain = Self::new();
        for repo in repos {
            let client = PyPiClient::new(&repo.url)?.with_token(repo.token.clone());
            chain.push(&repo.name, repo.priority, Box::new(client));
        }
        Ok(chain)
    }

    /// Insert keeping ascending priority; equal priorities keep insertion order.
    pub fn push(&mut self, name: &str, priority: u32, source: Box<dyn MetadataSource>) {
        let at = self.entries.partition_point(|e| e.priority <= priority);
        self.entries.insert(
            at,
            Entry {
                name: name.to_string(),
                priority,
                source,
            },
        );
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MetadataSource for RepositoryChain {
    async fn package_metadata(
        &self,
        name: &PackageName,
        version: Option<&str>,
    ) -> Result<PackageMetadata, IndexError> {
        let mut last_error = None;
        for entry in &self.entries {
            match entry.source.package_metadata(name, version).await {
                Ok(meta) => {
                    tracing::debug!(package = %name, repository = %entry.name, "metadata found");
                    return Ok(meta);
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    tracing::warn!(package = %name, repository = %entry.name, error = %e, "repository failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| IndexError::not_found(name, version)))
    }
}
