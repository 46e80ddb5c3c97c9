//! Client for the PyPI JSON API (`/pypi/<name>/json`).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use pywhl_schema::{ArtifactDescriptor, PackageMetadata, PackageName, Sha256Digest};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{IndexError, MetadataSource};

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PyPiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl PyPiClient {
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be built (TLS backend init).
    pub fn new(base_url: &str) -> Result<Self, IndexError> {
        let client = Client::builder().timeout(METADATA_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, name: &PackageName, version: Option<&str>) -> String {
        match version {
            Some(v) => format!("{}/{}/{}/json", self.base_url, name, v),
            None => format!("{}/{}/json", self.base_url, name),
        }
    }
}

#[async_trait]
impl MetadataSource for PyPiClient {
    async fn package_metadata(
        &self,
        name: &PackageName,
        version: Option<&str>,
    ) -> Result<PackageMetadata, IndexError> {
        let url = self.url_for(name, version);
        tracing::debug!(%url, "fetching package metadata");

        let mut request = self
            .client
            .get(&url)
            .header(USER_AGENT, crate::USER_AGENT)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(IndexError::not_found(name, version)),
            s if !s.is_success() => {
                return Err(IndexError::Status {
                    status: s.as_u16(),
                    url,
                });
            }
            _ => {}
        }

        let body = response.text().await?;
        let project: ProjectResponse =
            serde_json::from_str(&body).map_err(|e| IndexError::Decode {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(project.into_metadata())
    }
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,
    #[serde(default)]
    releases: BTreeMap<String, Vec<ReleaseFile>>,
    #[serde(default)]
    urls: Vec<ReleaseFile>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    name: String,
    version: String,
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    filename: String,
    url: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    digests: Digests,
    #[serde(default)]
    yanked: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Digests {
    #[serde(default)]
    sha256: Option<String>,
}

impl ReleaseFile {
    fn into_descriptor(self) -> ArtifactDescriptor {
        // A digest the index got wrong is dropped, not trusted.
        let sha256 = self.digests.sha256.as_deref().and_then(|d| Sha256Digest::new(d).ok());
        ArtifactDescriptor {
            filename: self.filename,
            url: self.url,
            size: self.size,
            sha256,
            yanked: self.yanked,
        }
    }
}

impl ProjectResponse {
    fn into_metadata(self) -> PackageMetadata {
        let mut releases: BTreeMap<String, Vec<ArtifactDescriptor>> = self
            .releases
            .into_iter()
            .map(|(v, files)| (v, files.into_iter().map(ReleaseFile::into_descriptor).collect()))
            .collect();

        // Version endpoints carry only `urls` for the requested release.
        if !self.urls.is_empty() && releases.get(&self.info.version).is_none_or(Vec::is_empty) {
            releases.insert(
                self.info.version.clone(),
                self.urls.into_iter().map(ReleaseFile::into_descriptor).collect(),
            );
        }
        if releases.is_empty() {
            releases.insert(self.info.version.clone(), Vec::new());
        }

        PackageMetadata {
            name: self.info.name,
            latest_version: self.info.version,
            available_versions: releases.keys().cloned().collect(),
            releases,
            requires: self.info.requires_dist.unwrap_or_default(),
            summary: self.info.summary.filter(|s| !s.is_empty()),
        }
    }
}
