//! Effective settings for one command.
//!
//! Precedence: command-line flag, then environment (`PYWHL_INDEX_URL`, read
//! by clap), then `~/.pywhl/config.toml`, then built-in defaults.

use anyhow::{Context, Result};
use pywhl_core::cache::CacheStore;
use pywhl_core::config::{Config, DEFAULT_INDEX_URL};
use pywhl_core::index::RepositoryChain;
use pywhl_core::io::{DownloadOptions, Downloader, HttpTransport};
use pywhl_core::resolver::ResolveOptions;
use pywhl_schema::{MarkerEnvironment, PythonVersion, TargetPlatform};
use std::path::PathBuf;
use std::time::Duration;

/// Value that asks for detection instead of a fixed target.
const AUTO: &str = "auto";

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub python: Option<String>,
    pub platform: Option<String>,
    pub output: Option<PathBuf>,
    pub parallel: Option<usize>,
    pub index_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub python: PythonVersion,
    pub platform: TargetPlatform,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub index_url: String,
    pub download: DownloadOptions,
    pub timeout: Duration,
    pub max_depth: usize,
}

impl Settings {
    /// Read the config file and apply `overrides` on top.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let config = Config::load_default()?;
        Self::from_config(config, overrides)
    }

    pub fn from_config(config: Config, overrides: &Overrides) -> Result<Self> {
        let defaults = &config.defaults;

        let python_raw = overrides.python.as_deref().unwrap_or(&defaults.python_version);
        let python = parse_python(python_raw)?;

        let platform_raw = overrides.platform.as_deref().unwrap_or(&defaults.platform);
        let platform = if platform_raw.eq_ignore_ascii_case(AUTO) {
            TargetPlatform::current()
        } else {
            TargetPlatform::new(platform_raw)
        };

        let download = DownloadOptions {
            max_attempts: defaults.retries.max(1),
            base_delay: config.retry_delay(),
            concurrency: overrides.parallel.unwrap_or(defaults.concurrency).max(1),
        };

        Ok(Self {
            python,
            platform,
            output_dir: overrides
                .output
                .clone()
                .unwrap_or_else(|| defaults.output_dir.clone()),
            cache_dir: config.cache_dir(),
            index_url: overrides
                .index_url
                .clone()
                .unwrap_or_else(|| DEFAULT_INDEX_URL.to_string()),
            download,
            timeout: config.timeout(),
            max_depth: defaults.max_depth,
            config,
        })
    }

    /// Every configured index, public one included, in priority order.
    pub fn source(&self) -> Result<RepositoryChain> {
        let repos = self.config.repositories(&self.index_url);
        tracing::debug!(count = repos.len(), "configured repositories");
        RepositoryChain::from_repositories(&repos).context("Failed to set up package index clients")
    }

    pub fn resolve_options(&self, follow_dependencies: bool) -> ResolveOptions {
        ResolveOptions {
            max_depth: self.max_depth,
            environment: MarkerEnvironment::for_target(self.python, &self.platform),
            follow_dependencies,
        }
    }

    pub fn cache(&self) -> CacheStore {
        CacheStore::new(&self.cache_dir)
    }

    pub fn downloader(&self) -> Result<Downloader<HttpTransport>> {
        let transport = HttpTransport::new(self.timeout).context("Failed to build HTTP client")?;
        Ok(Downloader::new(transport, self.download))
    }
}

fn parse_python(raw: &str) -> Result<PythonVersion> {
    if raw.eq_ignore_ascii_case(AUTO) {
        return Ok(crate::python::detect_or_default());
    }
    raw.parse()
        .with_context(|| format!("Invalid python version '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_apply() {
        let config = Config::parse(
            r#"
            [defaults]
            python_version = "3.10"
            platform = "win_amd64"
            concurrency = 6
            retries = 5
            "#,
        )
        .unwrap();
        let settings = Settings::from_config(config, &Overrides::default()).unwrap();

        assert_eq!(settings.python, PythonVersion::new(3, 10));
        assert_eq!(settings.platform.as_str(), "win_amd64");
        assert_eq!(settings.download.concurrency, 6);
        assert_eq!(settings.download.max_attempts, 5);
        assert_eq!(settings.index_url, DEFAULT_INDEX_URL);
        assert_eq!(settings.output_dir, PathBuf::from("./wheels"));
    }

    #[test]
    fn test_flags_beat_config() {
        let config = Config::parse("[defaults]\npython_version = \"3.10\"\nconcurrency = 6\n").unwrap();
        let overrides = Overrides {
            python: Some("3.12".to_string()),
            platform: Some("macosx_11_0_arm64".to_string()),
            output: Some(PathBuf::from("out")),
            parallel: Some(2),
            index_url: Some("http://localhost:9999/pypi".to_string()),
        };
        let settings = Settings::from_config(config, &overrides).unwrap();

        assert_eq!(settings.python, PythonVersion::new(3, 12));
        assert_eq!(settings.platform.as_str(), "macosx_11_0_arm64");
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        assert_eq!(settings.download.concurrency, 2);
        assert_eq!(settings.index_url, "http://localhost:9999/pypi");
    }

    #[test]
    fn test_zero_parallel_is_clamped() {
        let overrides = Overrides {
            parallel: Some(0),
            ..Default::default()
        };
        let settings = Settings::from_config(Config::default(), &overrides).unwrap();
        assert_eq!(settings.download.concurrency, 1);
    }

    #[test]
    fn test_bad_python_version() {
        let overrides = Overrides {
            python: Some("three".to_string()),
            ..Default::default()
        };
        let err = Settings::from_config(Config::default(), &overrides).unwrap_err();
        assert!(err.to_string().contains("three"));
    }

    #[test]
    fn test_auto_platform_is_current() {
        let overrides = Overrides {
            platform: Some("auto".to_string()),
            ..Default::default()
        };
        let settings = Settings::from_config(Config::default(), &overrides).unwrap();
        assert_eq!(settings.platform, TargetPlatform::current());
    }
}
