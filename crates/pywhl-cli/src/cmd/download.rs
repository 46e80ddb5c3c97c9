//! Download command

use anyhow::{Context, Result, bail};
use pywhl_core::Reporter;
use pywhl_core::cache::CacheStore;
use pywhl_core::index::MetadataSource;
use pywhl_core::io::{ArtifactTransport, Downloader};
use pywhl_core::plan::{Plan, PlanError, PlanOptions};
use pywhl_core::resolver::{DependencyResolver, ResolutionResult};
use pywhl_schema::{PackageName, PackageRequirement, RequirementsFile};
use std::path::Path;
use std::time::Instant;

use crate::settings::{Overrides, Settings};
use crate::ui::Output;
use crate::ui::tree::{render_conflicts, render_tree};

/// Switches that only affect `download`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadFlags {
    /// Follow dependencies
    pub deps: bool,
    pub use_cache: bool,
    pub allow_free_threaded: bool,
    pub strict: bool,
    pub quiet: bool,
}

impl DownloadFlags {
    fn plan_options(&self, settings: &Settings) -> PlanOptions {
        PlanOptions {
            python: settings.python,
            platform: settings.platform.clone(),
            prefer_standard_build: !self.allow_free_threaded,
            strict: self.strict,
            use_cache: self.use_cache,
            output_dir: settings.output_dir.clone(),
        }
    }
}

/// Download one package spec, with dependencies when `--deps` is set.
pub async fn download(spec: &str, overrides: &Overrides, flags: &DownloadFlags) -> Result<()> {
    let settings = Settings::load(overrides)?;
    let requirement =
        PackageRequirement::parse(spec).with_context(|| format!("Invalid package spec '{spec}'"))?;
    let source = settings.source()?;
    let downloader = settings.downloader()?;
    let cache = settings.cache();
    let output = Output::quiet(flags.quiet);
    let start = Instant::now();

    output.info(&format!(
        "Target: Python {} on {}",
        settings.python, settings.platform
    ));

    let result = fetch_requirement(
        &requirement,
        &settings,
        flags,
        &source,
        &cache,
        &downloader,
        &output,
    )
    .await;

    match result {
        Ok(written) => {
            output.summary(written, "downloaded", start.elapsed().as_secs_f64());
            output.success(&format!(
                "Downloaded {written} wheel(s) to {}",
                settings.output_dir.display()
            ));
            output.wait_async().await;
            Ok(())
        }
        Err(e) => {
            output.summary_with_failures(0, 1, "downloaded", start.elapsed().as_secs_f64());
            output.error(&format!("{e:#}"));
            output.wait_async().await;
            Err(e)
        }
    }
}

/// Download every requirement in a requirements file. Each line is handled
/// on its own; one failing never stops the rest.
pub async fn download_requirements(
    path: &Path,
    overrides: &Overrides,
    flags: &DownloadFlags,
) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file = RequirementsFile::parse(&text);

    let settings = Settings::load(overrides)?;
    let source = settings.source()?;
    let downloader = settings.downloader()?;
    let cache = settings.cache();
    let output = Output::quiet(flags.quiet);
    let start = Instant::now();

    for (line, option) in &file.skipped {
        tracing::warn!(line, option = %option, "skipping requirements file option");
    }

    let mut written = 0;
    let mut failed = Vec::new();
    for (line, entry) in &file.entries {
        let requirement = match entry {
            Ok(requirement) => requirement,
            Err(e) => {
                output.warning(&format!("{}:{line}: {e}", path.display()));
                failed.push(format!("line {line}"));
                continue;
            }
        };
        match fetch_requirement(
            requirement,
            &settings,
            flags,
            &source,
            &cache,
            &downloader,
            &output,
        )
        .await
        {
            Ok(count) => written += count,
            Err(e) => {
                output.warning(&format!("{requirement}: {e:#}"));
                failed.push(requirement.to_string());
            }
        }
    }

    output.summary_with_failures(
        written,
        failed.len(),
        "downloaded",
        start.elapsed().as_secs_f64(),
    );
    if failed.is_empty() {
        output.success(&format!(
            "Downloaded {written} wheel(s) to {}",
            settings.output_dir.display()
        ));
        output.wait_async().await;
        Ok(())
    } else {
        output.error(&format!("{} requirement(s) failed: {}", failed.len(), failed.join(", ")));
        output.wait_async().await;
        bail!("{} of {} requirement(s) failed", failed.len(), file.entries.len())
    }
}

/// Resolve, plan, report and download one requirement. Returns how many
/// wheels are now in the output directory.
async fn fetch_requirement<T: ArtifactTransport>(
    requirement: &PackageRequirement,
    settings: &Settings,
    flags: &DownloadFlags,
    source: &dyn MetadataSource,
    cache: &CacheStore,
    downloader: &Downloader<T>,
    output: &Output,
) -> Result<usize> {
    let (result, plan) = plan_requirement(requirement, settings, flags, source, cache).await?;

    if flags.deps {
        for line in render_tree(&result) {
            output.line(&line);
        }
    }
    report_plan(&plan, &result.root, output)?;

    let report = plan.execute(downloader, output).await?;
    if !report.errors.is_empty() {
        let names: Vec<&str> = report.errors.iter().map(|e| e.filename.as_str()).collect();
        bail!("{} download(s) failed: {}", names.len(), names.join(", "));
    }
    Ok(report.written.len())
}

/// Resolve `requirement` and pick a wheel for every resolved package.
pub async fn plan_requirement(
    requirement: &PackageRequirement,
    settings: &Settings,
    flags: &DownloadFlags,
    source: &dyn MetadataSource,
    cache: &CacheStore,
) -> Result<(ResolutionResult, Plan)> {
    let resolver = DependencyResolver::new(source, settings.resolve_options(flags.deps));
    let result = resolver
        .resolve(requirement)
        .await
        .with_context(|| format!("Failed to resolve {requirement}"))?;

    let plan = match Plan::build(&result, &flags.plan_options(settings), cache) {
        Ok(plan) => plan,
        Err(PlanError::Conflicts(conflicts)) => {
            bail!(
                "{} conflict(s) with --strict:\n{}",
                conflicts.len(),
                render_conflicts(&conflicts).join("\n")
            );
        }
    };
    Ok((result, plan))
}

/// Surface conflicts and misses. A root package without a usable wheel is
/// an error; anything else is a warning.
fn report_plan(plan: &Plan, root: &PackageName, output: &Output) -> Result<()> {
    if !plan.conflicts.is_empty() {
        output.warning(&format!(
            "{} package(s) skipped because of conflicting requirements",
            plan.conflicts.len()
        ));
        for line in render_conflicts(&plan.conflicts) {
            output.line(&format!("  {line}"));
        }
    }

    for miss in &plan.misses {
        if miss.name == *root {
            bail!("No compatible wheel for {} {}: {}", miss.name, miss.version, miss.report);
        }
        output.warning(&format!("{} {}: {}", miss.name, miss.version, miss.report));
    }

    let cached = plan.selections.len() - plan.pending().count();
    if cached > 0 {
        output.info(&format!("{cached} wheel(s) already cached"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pywhl_core::config::Config;
    use pywhl_core::index::MemoryIndex;
    use pywhl_schema::ArtifactDescriptor;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        let overrides = Overrides {
            python: Some("3.13".to_string()),
            platform: Some("manylinux_2_17_x86_64".to_string()),
            output: Some(dir.path().join("out")),
            ..Default::default()
        };
        let mut settings = Settings::from_config(Config::default(), &overrides).unwrap();
        settings.cache_dir = dir.path().join("cache");
        settings
    }

    fn wheel(filename: &str) -> ArtifactDescriptor {
        ArtifactDescriptor::new(filename, format!("https://files.example/{filename}"))
    }

    fn index() -> MemoryIndex {
        let mut index = MemoryIndex::new();
        index
            .add_release(
                "app",
                "1.0.0",
                &["dep>=1.0.0"],
                &[
                    wheel("app-1.0.0-cp313-cp313t-manylinux_2_17_x86_64.whl"),
                    wheel("app-1.0.0-py3-none-any.whl"),
                ],
            )
            .add_release("dep", "1.1.0", &[], &[wheel("dep-1.1.0-cp313-cp313t-manylinux_2_17_x86_64.whl")]);
        index
    }

    #[tokio::test]
    async fn test_without_deps_plans_root_only() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let requirement = PackageRequirement::parse("app").unwrap();
        let flags = DownloadFlags {
            use_cache: true,
            ..Default::default()
        };

        let (result, plan) =
            plan_requirement(&requirement, &settings, &flags, &index(), &settings.cache()).await.unwrap();
        assert_eq!(result.resolved.len(), 1);
        assert_eq!(plan.selections.len(), 1);
        assert_eq!(plan.selections[0].artifact.filename, "app-1.0.0-py3-none-any.whl");
    }

    #[tokio::test]
    async fn test_free_threaded_needs_opt_in() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let requirement = PackageRequirement::parse("app").unwrap();
        let cache = settings.cache();

        let standard = DownloadFlags {
            deps: true,
            use_cache: true,
            ..Default::default()
        };
        let (_, plan) = plan_requirement(&requirement, &settings, &standard, &index(), &cache).await.unwrap();
        assert_eq!(plan.selections.len(), 1);
        assert_eq!(plan.misses.len(), 1);
        assert_eq!(plan.misses[0].name, "dep");

        let lenient = DownloadFlags {
            allow_free_threaded: true,
            ..standard
        };
        let (_, plan) = plan_requirement(&requirement, &settings, &lenient, &index(), &cache).await.unwrap();
        assert_eq!(plan.selections.len(), 2);
        // A standard build still wins where one exists.
        assert_eq!(plan.selections[0].artifact.filename, "app-1.0.0-py3-none-any.whl");
    }

    #[tokio::test]
    async fn test_strict_conflict_is_an_error() {
        let mut index = MemoryIndex::new();
        index
            .add_release("app", "1.0.0", &["dep>=9.0.0"], &[wheel("app-1.0.0-py3-none-any.whl")])
            .add_versions("dep", &["1.0.0"]);

        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let requirement = PackageRequirement::parse("app").unwrap();
        let flags = DownloadFlags {
            deps: true,
            strict: true,
            use_cache: true,
            ..Default::default()
        };

        let err = plan_requirement(&requirement, &settings, &flags, &index, &settings.cache())
            .await
            .unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("--strict"), "{text}");
        assert!(text.contains(">=9.0.0 required by app"), "{text}");
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let requirement = PackageRequirement::parse("nothing-here").unwrap();

        let err = plan_requirement(
            &requirement,
            &settings,
            &DownloadFlags::default(),
            &MemoryIndex::new(),
            &settings.cache(),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("not found"));
    }
}
