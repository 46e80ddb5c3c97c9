//! Resolution to files on disk.
//!
//! [`Plan::build`] picks one wheel per resolved package and checks the
//! cache; [`Plan::execute`] fetches what is missing and copies everything
//! into the output directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pywhl_schema::{ArtifactDescriptor, PackageName, PythonVersion, TargetPlatform, Version};
use thiserror::Error;

use crate::Reporter;
use crate::cache::CacheStore;
use crate::io::{ArtifactTransport, DownloadError, DownloadResult, DownloadTask, Downloader};
use crate::matcher::{CompatibilityReport, diagnose, select_best};
use crate::resolver::{Conflict, ResolutionResult};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("resolution failed with {} conflict(s)", .0.len())]
    Conflicts(Vec<Conflict>),
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub python: PythonVersion,
    pub platform: TargetPlatform,
    pub prefer_standard_build: bool,
    /// Any conflict aborts the whole plan.
    pub strict: bool,
    /// When false, wheels go straight to the output directory.
    pub use_cache: bool,
    pub output_dir: PathBuf,
}

/// The wheel chosen for one package.
#[derive(Debug, Clone)]
pub struct Selection {
    pub name: PackageName,
    pub version: Version,
    pub artifact: ArtifactDescriptor,
    /// Where the file is fetched to: the cache entry, or the output file.
    pub source: PathBuf,
    pub cached: bool,
}

/// A resolved package with no usable wheel.
#[derive(Debug, Clone)]
pub struct Miss {
    pub name: PackageName,
    pub version: Version,
    pub report: CompatibilityReport,
}

#[derive(Debug)]
pub struct Plan {
    pub selections: Vec<Selection>,
    pub misses: Vec<Miss>,
    /// Packages left out because their constraints conflict.
    pub conflicts: Vec<Conflict>,
    pub output_dir: PathBuf,
}

#[derive(Debug, Default)]
pub struct ExecuteReport {
    pub downloaded: Vec<DownloadResult>,
    /// Selections served from the cache.
    pub reused: usize,
    pub errors: Vec<DownloadError>,
    /// Files now present in the output directory.
    pub written: Vec<PathBuf>,
}

impl Plan {
    /// # Errors
    ///
    /// With `strict`, any conflict is returned as [`PlanError::Conflicts`].
    pub fn build(
        resolution: &ResolutionResult,
        options: &PlanOptions,
        cache: &CacheStore,
    ) -> Result<Self, PlanError> {
        if options.strict && !resolution.is_success() {
            return Err(PlanError::Conflicts(resolution.conflicts.clone()));
        }

        let mut selections = Vec::new();
        let mut misses = Vec::new();
        let mut seen = HashSet::new();

        for (name, version) in &resolution.resolved {
            let artifacts = resolution.artifacts(name);
            let Some(artifact) = select_best(
                artifacts,
                options.python,
                &options.platform,
                options.prefer_standard_build,
            ) else {
                let report = diagnose(artifacts, options.python, &options.platform);
                tracing::debug!(package = %name, %version, %report, "no compatible wheel");
                misses.push(Miss {
                    name: name.clone(),
                    version: version.clone(),
                    report,
                });
                continue;
            };

            let version_text = version.to_string();
            let (source, cached) = if options.use_cache {
                let path = cache.path(name, &version_text, &artifact.filename);
                let hit = cache.exists(name, &version_text, &artifact.filename);
                (path, hit)
            } else {
                (options.output_dir.join(&artifact.filename), false)
            };
            if !seen.insert(source.clone()) {
                continue;
            }

            tracing::debug!(package = %name, file = %artifact.filename, cached, "selected wheel");
            selections.push(Selection {
                name: name.clone(),
                version: version.clone(),
                artifact: artifact.clone(),
                source,
                cached,
            });
        }

        Ok(Self {
            selections,
            misses,
            conflicts: resolution.conflicts.clone(),
            output_dir: options.output_dir.clone(),
        })
    }

    pub fn pending(&self) -> impl Iterator<Item = &Selection> {
        self.selections.iter().filter(|s| !s.cached)
    }

    /// Fetch uncached selections, then copy everything that is available
    /// into the output directory.
    ///
    /// # Errors
    ///
    /// Fails when the output directory cannot be created or a file cannot
    /// be copied into it. Download failures are reported, not raised.
    pub async fn execute<T: ArtifactTransport>(
        &self,
        downloader: &Downloader<T>,
        reporter: &dyn Reporter,
    ) -> Result<ExecuteReport> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;

        let tasks: Vec<DownloadTask> = self
            .pending()
            .map(|s| {
                DownloadTask::new(&s.artifact.url, &s.source, &s.artifact.filename)
                    .with_sha256(s.artifact.sha256.clone())
                    .with_size_hint(s.artifact.size)
            })
            .collect();

        let outcome = if tasks.is_empty() {
            Default::default()
        } else {
            downloader.fetch_many(&tasks, reporter).await
        };

        let mut report = ExecuteReport {
            reused: self.selections.len() - tasks.len(),
            ..Default::default()
        };
        let fetched: HashSet<&Path> = outcome.results.iter().map(|r| r.path.as_path()).collect();

        for selection in &self.selections {
            if !selection.cached && !fetched.contains(selection.source.as_path()) {
                continue;
            }
            let target = self.output_dir.join(&selection.artifact.filename);
            if selection.source != target {
                std::fs::copy(&selection.source, &target).with_context(|| {
                    format!("Failed to copy {} to {}", selection.source.display(), target.display())
                })?;
            }
            if selection.cached {
                reporter.info(&format!("{} (cached)", selection.artifact.filename));
            }
            report.written.push(target);
        }

        report.downloaded = outcome.results;
        report.errors = outcome.errors;
        Ok(report)
    }
}
