//! User configuration read from `~/.pywhl/config.toml`.
//!
//! The file is optional and read-only: pywhl never writes it. Every field
//! has a built-in default so an empty or missing file behaves the same as
//! no configuration at all.
//!
//! ```toml
//! [defaults]
//! python_version = "3.11"
//! platform = "auto"
//! output_dir = "./wheels"
//! concurrency = 3
//!
//! [[repositories]]
//! name = "internal"
//! url = "https://pypi.internal.example/pypi"
//! priority = 1
//! auth_token = "${INTERNAL_PYPI_TOKEN}"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Public index JSON API.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: Defaults,
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Target interpreter, `MAJOR.MINOR`.
    pub python_version: String,
    /// Target platform tag, or `auto` for the running machine.
    pub platform: String,
    pub output_dir: PathBuf,
    /// Artifact cache; `~` is expanded.
    pub cache_dir: Option<String>,
    pub concurrency: usize,
    /// Total attempts per download, including the first.
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_depth: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            python_version: "3.9".to_string(),
            platform: "auto".to_string(),
            output_dir: PathBuf::from("./wheels"),
            cache_dir: None,
            concurrency: 3,
            retries: 3,
            retry_delay_ms: 1000,
            timeout_secs: 60,
            max_depth: 10,
        }
    }
}

/// One extra package index.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub url: String,
    /// Lower values are consulted first; the public index is priority 0.
    pub priority: Option<u32>,
    /// Bearer token; `${VAR}` reads it from the environment.
    pub auth_token: Option<String>,
}

impl Config {
    /// Load configuration from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not
    /// valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Load from the default location under the pywhl home.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_default() -> Result<Self> {
        Self::load(&paths::config_path())
    }

    /// Parse configuration text.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not valid TOML for this schema.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Cache directory with `~` expanded, defaulting to `~/.pywhl/cache`.
    pub fn cache_dir(&self) -> PathBuf {
        match &self.defaults.cache_dir {
            Some(dir) => expand_home(dir),
            None => paths::cache_path(),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.defaults.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.timeout_secs)
    }

    /// Every repository to query, the public index included, ordered by
    /// priority. Entries without a priority take their 1-based position.
    pub fn repositories(&self, index_url: &str) -> Vec<ResolvedRepository> {
        let mut repos = vec![ResolvedRepository {
            name: "pypi".to_string(),
            url: index_url.trim_end_matches('/').to_string(),
            priority: 0,
            token: None,
        }];
        for (idx, repo) in self.repositories.iter().enumerate() {
            let token = repo.auth_token.as_deref().and_then(|raw| {
                let resolved = expand_env(raw);
                if resolved.is_none() {
                    tracing::warn!(repository = %repo.name, "auth token not found in environment");
                }
                resolved
            });
            repos.push(ResolvedRepository {
                name: repo.name.clone(),
                url: repo.url.replace("/simple", "/pypi").trim_end_matches('/').to_string(),
                priority: repo.priority.unwrap_or(idx as u32 + 1),
                token,
            });
        }
        // Stable: equal priorities keep file order.
        repos.sort_by_key(|r| r.priority);
        repos
    }
}

/// A repository with its token resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRepository {
    pub name: String,
    pub url: String,
    pub priority: u32,
    pub token: Option<String>,
}

/// `${VAR}` reads `VAR` from the environment; anything else is literal.
fn expand_env(raw: &str) -> Option<String> {
    match raw.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
        Some(var) => std::env::var(var).ok().filter(|v| !v.is_empty()),
        None => Some(raw.to_string()),
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.defaults.python_version, "3.9");
        assert_eq!(config.defaults.concurrency, 3);
        assert_eq!(config.defaults.retries, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.defaults.max_depth, 10);
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn test_partial_defaults() {
        let config = Config::parse("[defaults]\npython_version = \"3.12\"\n").unwrap();
        assert_eq!(config.defaults.python_version, "3.12");
        assert_eq!(config.defaults.platform, "auto");
    }

    #[test]
    fn test_repository_ordering() {
        let config = Config::parse(
            r#"
[[repositories]]
name = "mirror"
url = "https://mirror.example/simple/"

[[repositories]]
name = "internal"
url = "https://internal.example/pypi"
priority = 1
auth_token = "literal-token"
"#,
        )
        .unwrap();
        let repos = config.repositories(DEFAULT_INDEX_URL);
        let names: Vec<&str> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["pypi", "mirror", "internal"]);
        assert_eq!(repos[1].url, "https://mirror.example/pypi");
        assert_eq!(repos[2].token.as_deref(), Some("literal-token"));
    }

    #[test]
    fn test_missing_env_token() {
        assert_eq!(expand_env("${PYWHL_TEST_SURELY_UNSET_VAR}"), None);
        assert_eq!(expand_env("plain").as_deref(), Some("plain"));
    }

    #[test]
    fn test_invalid_config_errors() {
        assert!(Config::parse("[defaults]\nconcurrency = \"many\"\n").is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.defaults.output_dir, PathBuf::from("./wheels"));
    }
}
