//! Wheel compatibility and selection.
//!
//! Given the files of one release, decide which wheels run on the target
//! interpreter and platform and pick the single best one.

use std::collections::BTreeSet;
use std::fmt;

use pywhl_schema::target::{macos_version, platform_arch, platform_family};
use pywhl_schema::{
    ArtifactDescriptor, ArtifactTag, PlatformFamily, PythonVersion, TargetPlatform,
};
use serde::Serialize;

/// Whether any platform in the tag set runs on `target`.
pub fn is_platform_compatible(tag: &ArtifactTag, target: &TargetPlatform) -> bool {
    tag.platforms().any(|p| platform_matches(p, target))
}

fn platform_matches(wheel: &str, target: &TargetPlatform) -> bool {
    if wheel == "any" || wheel == target.as_str() {
        return true;
    }
    let same_arch = || platform_arch(wheel).is_some() && platform_arch(wheel) == target.arch();

    match (target.family(), platform_family(wheel)) {
        (PlatformFamily::Linux | PlatformFamily::ManyLinux, PlatformFamily::ManyLinux) => same_arch(),
        (PlatformFamily::MuslLinux, PlatformFamily::MuslLinux) => same_arch(),
        (PlatformFamily::MacOs { major, minor }, PlatformFamily::MacOs { .. }) => {
            let Some(built_for) = macos_version(wheel) else {
                return false;
            };
            built_for <= (major, minor) && macos_arch_matches(platform_arch(wheel), target.arch())
        }
        _ => false,
    }
}

fn macos_arch_matches(wheel: Option<&str>, target: Option<&str>) -> bool {
    match (wheel, target) {
        (Some(w), Some(t)) if w == t => true,
        (Some("universal2"), Some("arm64" | "x86_64")) => true,
        (Some("universal" | "intel"), Some("x86_64")) => true,
        _ => false,
    }
}

/// Whether the runtime tag set accepts `python`.
///
/// Bare major tags (`py3`) accept any minor of that major; `cpXY` and
/// `pyXY` need an exact major.minor match; other implementations never
/// match. Free-threaded builds are rejected when `prefer_standard_build`.
pub fn is_runtime_compatible(
    tag: &ArtifactTag,
    python: PythonVersion,
    prefer_standard_build: bool,
) -> bool {
    if prefer_standard_build && tag.is_free_threaded() {
        return false;
    }
    tag.runtimes().any(|r| runtime_matches(r, python))
}

fn runtime_matches(runtime: &str, python: PythonVersion) -> bool {
    if runtime == python.major_tag() || runtime == python.py_tag() {
        return true;
    }
    let standard = runtime.strip_suffix('t').unwrap_or(runtime);
    runtime.starts_with("cp") && standard == python.cp_tag()
}

/// Both runtime and platform checks.
pub fn is_compatible(
    tag: &ArtifactTag,
    python: PythonVersion,
    platform: &TargetPlatform,
    prefer_standard_build: bool,
) -> bool {
    is_runtime_compatible(tag, python, prefer_standard_build) && is_platform_compatible(tag, platform)
}

/// Sort key; lower is better.
fn rank(tag: &ArtifactTag, artifact: &ArtifactDescriptor, platform: &TargetPlatform) -> (bool, bool, bool, bool) {
    let exact = tag.platforms().any(|p| p == platform.as_str());
    (tag.is_free_threaded(), tag.is_any_platform(), !exact, artifact.yanked)
}

/// Pick the best compatible wheel, or `None` when nothing fits.
///
/// Files that are not wheels (sdists) are skipped. Among compatible wheels
/// the order is: standard build first, then platform-specific over `any`,
/// then an exact platform match over a family match. Yanked files lose the
/// remaining ties. Input order decides anything left.
pub fn select_best<'a>(
    artifacts: &'a [ArtifactDescriptor],
    python: PythonVersion,
    platform: &TargetPlatform,
    prefer_standard_build: bool,
) -> Option<&'a ArtifactDescriptor> {
    let mut compatible: Vec<(ArtifactTag, &ArtifactDescriptor)> = artifacts
        .iter()
        .filter_map(|a| match ArtifactTag::parse(&a.filename) {
            Ok(tag) => Some((tag, a)),
            Err(e) => {
                tracing::debug!(file = %a.filename, error = %e, "skipping");
                None
            }
        })
        .filter(|(tag, _)| is_compatible(tag, python, platform, prefer_standard_build))
        .collect();

    compatible.sort_by_key(|(tag, a)| rank(tag, a, platform));
    compatible.first().map(|(_, a)| *a)
}

/// What a release offered, for explaining a `select_best` miss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatibilityReport {
    /// The target runtime, as a tag (`cp311`).
    pub requested_runtime: String,
    /// The target platform tag.
    pub requested_platform: String,
    /// Runtime tags seen across the wheels.
    pub runtimes: BTreeSet<String>,
    /// Platform tags seen across the wheels.
    pub platforms: BTreeSet<String>,
    /// Wheels that would match if free-threaded builds were allowed.
    pub free_threaded_only: usize,
    /// Files that were not wheels.
    pub skipped: usize,
}

impl CompatibilityReport {
    /// Whether the release had any parseable wheel at all.
    pub fn has_wheels(&self) -> bool {
        !self.runtimes.is_empty()
    }
}

impl fmt::Display for CompatibilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no wheel for {} on {}",
            self.requested_runtime, self.requested_platform
        )?;
        if !self.has_wheels() {
            return write!(f, " (release has no wheels, {} other files)", self.skipped);
        }
        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(", ");
        write!(
            f,
            " (runtimes: {}; platforms: {})",
            join(&self.runtimes),
            join(&self.platforms)
        )?;
        if self.free_threaded_only > 0 {
            write!(f, "; {} free-threaded build(s) excluded", self.free_threaded_only)?;
        }
        Ok(())
    }
}

/// Collect the tags a release did offer.
pub fn diagnose(
    artifacts: &[ArtifactDescriptor],
    python: PythonVersion,
    platform: &TargetPlatform,
) -> CompatibilityReport {
    let mut report = CompatibilityReport {
        requested_runtime: python.cp_tag(),
        requested_platform: platform.as_str().to_string(),
        ..Default::default()
    };
    for artifact in artifacts {
        let Ok(tag) = ArtifactTag::parse(&artifact.filename) else {
            report.skipped += 1;
            continue;
        };
        report.runtimes.extend(tag.runtimes().map(str::to_string));
        report.platforms.extend(tag.platforms().map(str::to_string));
        if tag.is_free_threaded() && is_compatible(&tag, python, platform, false) {
            report.free_threaded_only += 1;
        }
    }
    report
}
