//! Transitive dependency resolution.
//!
//! Resolution runs in two passes over one [`Session`]:
//!
//! 1. **Collecting**: a depth-first walk from the root requirement. Every
//!    requirement reached records one [`ConstraintRecord`] under its package
//!    name. Requirements whose marker is false for the target, including
//!    those scoped to extras nobody asked for, are never walked.
//!    A declared requirement that does not parse becomes a [`Conflict`]
//!    against the package it names.
//! 2. **Solving**: for each package, the highest available version that
//!    satisfies every record wins. Prereleases are only picked when no final
//!    release does. Packages are solved independently and
//!    there is no backtracking, so a choice for one package never revisits
//!    another.
//!
//! Every package is solved before the result is returned, so a failed
//! resolution lists all of its conflicts at once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use pywhl_schema::{
    ArtifactDescriptor, MarkerEnvironment, PackageMetadata, PackageName, PackageRequirement,
    RequirementError, Version, VersionConstraint,
};
use serde::Serialize;
use thiserror::Error;

use crate::index::{IndexError, MetadataSource};

/// Source name recorded for the root requirement.
pub const ROOT_SOURCE: &str = "root";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("maximum dependency depth ({max}) exceeded at {path}")]
    MaxDepthExceeded { max: usize, path: String },

    #[error("package '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error("failed to fetch metadata for '{name}': {message}")]
    Index { name: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    Collecting,
    Solving,
    Done,
    Conflicted,
}

/// One requirement edge as seen during collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintRecord {
    pub package: PackageName,
    /// Constraint text, `*` when unconstrained.
    pub constraint: String,
    /// Package that declared the requirement, or `root`.
    pub source: String,
    /// Ancestors from the root down to `source`.
    pub path: Vec<PackageName>,
    #[serde(skip)]
    range: VersionConstraint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictConstraint {
    pub constraint: String,
    pub source: String,
}

/// A package no single version could satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub package: PackageName,
    pub constraints: Vec<ConflictConstraint>,
    /// Set when the versions could not even be listed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = &self.error {
            return write!(f, "{}: {}", self.package, error);
        }
        let parts: Vec<String> = self
            .constraints
            .iter()
            .map(|c| format!("{} (from {})", c.constraint, c.source))
            .collect();
        write!(f, "{}: conflicting requirements {}", self.package, parts.join(", "))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionResult {
    pub root: PackageName,
    /// One version per package. Conflicting packages are absent.
    pub resolved: BTreeMap<PackageName, Version>,
    pub conflicts: Vec<Conflict>,
    pub records: BTreeMap<PackageName, Vec<ConstraintRecord>>,
    /// Index listing for each resolved package.
    #[serde(skip)]
    pub metadata: BTreeMap<PackageName, Arc<PackageMetadata>>,
}

impl ResolutionResult {
    pub fn is_success(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn state(&self) -> ResolutionState {
        if self.is_success() {
            ResolutionState::Done
        } else {
            ResolutionState::Conflicted
        }
    }

    /// Direct dependencies recorded for `name`, in first-seen order.
    pub fn children(&self, name: &PackageName) -> Vec<&PackageName> {
        let mut seen = HashSet::new();
        let mut out: Vec<(&[PackageName], &PackageName)> = self
            .records
            .values()
            .flatten()
            .filter(|r| r.path.last() == Some(name))
            .map(|r| (r.path.as_slice(), &r.package))
            .collect();
        out.sort_by_key(|(path, _)| path.len());
        out.into_iter()
            .filter(|(_, p)| seen.insert(*p))
            .map(|(_, p)| p)
            .collect()
    }

    /// Files published for the resolved version of `name`.
    pub fn artifacts(&self, name: &PackageName) -> &[ArtifactDescriptor] {
        let (Some(meta), Some(version)) = (self.metadata.get(name), self.resolved.get(name)) else {
            return &[];
        };
        meta.releases
            .iter()
            .find(|(raw, _)| Version::parse_release(raw).is_ok_and(|v| v == *version))
            .map_or(&[], |(_, files)| files.as_slice())
    }
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub max_depth: usize,
    /// Environment markers are evaluated against this.
    pub environment: MarkerEnvironment,
    /// When false only the root is recorded.
    pub follow_dependencies: bool,
}

/// Listing or lookup failure kept in the session memo.
#[derive(Debug, Clone)]
struct Failure {
    not_found: bool,
    message: String,
}

impl From<IndexError> for Failure {
    fn from(e: IndexError) -> Self {
        Self {
            not_found: e.is_not_found(),
            message: e.to_string(),
        }
    }
}

type Memo = Result<Arc<PackageMetadata>, Failure>;

/// Per-call resolution state. Nothing here outlives one `resolve()`.
struct Session {
    state: ResolutionState,
    records: BTreeMap<PackageName, Vec<ConstraintRecord>>,
    listings: HashMap<PackageName, Memo>,
    described: HashMap<(PackageName, String), Memo>,
    expanded: HashSet<(PackageName, String, Vec<String>)>,
    /// Declared requirements that failed to parse.
    invalid: Vec<Conflict>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: ResolutionState::Collecting,
            records: BTreeMap::new(),
            listings: HashMap::new(),
            described: HashMap::new(),
            expanded: HashSet::new(),
            invalid: Vec::new(),
        }
    }

    fn transition(&mut self, to: ResolutionState) {
        tracing::debug!(from = ?self.state, to = ?to, "resolution state");
        self.state = to;
    }

    async fn listing(&mut self, source: &dyn MetadataSource, name: &PackageName) -> Memo {
        if let Some(memo) = self.listings.get(name) {
            return memo.clone();
        }
        let memo = source.package_metadata(name, None).await.map(Arc::new).map_err(Failure::from);
        self.listings.insert(name.clone(), memo.clone());
        memo
    }

    async fn describe(&mut self, source: &dyn MetadataSource, name: &PackageName, version: &str) -> Memo {
        let key = (name.clone(), version.to_string());
        if let Some(memo) = self.described.get(&key) {
            return memo.clone();
        }
        let memo = source
            .package_metadata(name, Some(version))
            .await
            .map(Arc::new)
            .map_err(Failure::from);
        self.described.insert(key, memo.clone());
        memo
    }
}

/// Parseable versions of a listing, highest first.
fn sorted_versions(meta: &PackageMetadata) -> Vec<(Version, &str)> {
    let mut versions: Vec<(Version, &str)> = meta
        .available_versions
        .iter()
        .filter_map(|raw| match Version::parse_release(raw) {
            Ok(v) => Some((v, raw.as_str())),
            Err(e) => {
                tracing::debug!(package = %meta.name, version = %raw, error = %e, "skipping version");
                None
            }
        })
        .collect();
    versions.sort_by(|a, b| b.0.cmp(&a.0));
    versions
}

/// Highest of `versions` (sorted descending) inside every range. A
/// prerelease only qualifies when no final release does.
fn highest_match<'v>(
    versions: &'v [(Version, &'v str)],
    ranges: &[&VersionConstraint],
) -> Option<&'v (Version, &'v str)> {
    versions
        .iter()
        .find(|(v, _)| ranges.iter().all(|r| r.matches(v)))
        .or_else(|| versions.iter().find(|(v, _)| ranges.iter().all(|r| r.contains(v))))
}

/// Release whose requirements are walked for a record.
fn version_to_expand(meta: &PackageMetadata, range: &VersionConstraint) -> Option<String> {
    if range.is_any() {
        return Some(meta.latest_version.clone());
    }
    let versions = sorted_versions(meta);
    highest_match(&versions, &[range]).map(|(_, raw)| (*raw).to_string())
}

/// Best-effort package name at the start of a requirement that failed to
/// parse.
fn declared_name(text: &str) -> &str {
    let text = text.trim();
    text.split(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(text)
}

fn render_path(path: &[PackageName], tail: &PackageName) -> String {
    path.iter()
        .chain(std::iter::once(tail))
        .map(PackageName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub struct DependencyResolver<'a> {
    source: &'a dyn MetadataSource,
    options: ResolveOptions,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(source: &'a dyn MetadataSource, options: ResolveOptions) -> Self {
        Self { source, options }
    }

    /// Parse `spec` and resolve it.
    ///
    /// # Errors
    ///
    /// See [`DependencyResolver::resolve`]; also fails on a malformed spec.
    pub async fn resolve_spec(&self, spec: &str) -> Result<ResolutionResult, ResolveError> {
        let root = PackageRequirement::parse(spec)?;
        self.resolve(&root).await
    }

    /// Resolve `root` and everything it needs.
    ///
    /// Conflicts are part of a successful return; check
    /// [`ResolutionResult::is_success`].
    ///
    /// # Errors
    ///
    /// Fails when the root package cannot be fetched or the walk goes
    /// deeper than `max_depth`.
    pub async fn resolve(&self, root: &PackageRequirement) -> Result<ResolutionResult, ResolveError> {
        let mut session = Session::new();
        tracing::info!(root = %root, "resolving");

        self.collect(&mut session, root.clone(), Vec::new()).await?;

        session.transition(ResolutionState::Solving);
        let (mut resolved, mut conflicts, mut metadata) = self.solve(&mut session).await;
        for invalid in std::mem::take(&mut session.invalid) {
            resolved.remove(&invalid.package);
            metadata.remove(&invalid.package);
            match conflicts.iter_mut().find(|c| c.package == invalid.package) {
                Some(existing) => {
                    existing.constraints.extend(invalid.constraints);
                    existing.error.get_or_insert_with(|| invalid.error.unwrap_or_default());
                }
                None => conflicts.push(invalid),
            }
        }

        let result = ResolutionResult {
            root: root.name.clone(),
            resolved,
            conflicts,
            records: std::mem::take(&mut session.records),
            metadata,
        };
        session.transition(result.state());
        tracing::info!(
            resolved = result.resolved.len(),
            conflicts = result.conflicts.len(),
            "resolution finished"
        );
        Ok(result)
    }

    fn collect<'s>(
        &'s self,
        session: &'s mut Session,
        req: PackageRequirement,
        path: Vec<PackageName>,
    ) -> BoxFuture<'s, Result<(), ResolveError>> {
        Box::pin(async move {
            if path.len() > self.options.max_depth {
                return Err(ResolveError::MaxDepthExceeded {
                    max: self.options.max_depth,
                    path: render_path(&path, &req.name),
                });
            }
            if path.contains(&req.name) {
                tracing::warn!(cycle = %render_path(&path, &req.name), "circular dependency, dropping edge");
                return Ok(());
            }

            let range = req.constraint.clone().unwrap_or(VersionConstraint::Any);
            session.records.entry(req.name.clone()).or_default().push(ConstraintRecord {
                package: req.name.clone(),
                constraint: req.constraint_text(),
                source: path.last().map_or_else(|| ROOT_SOURCE.to_string(), ToString::to_string),
                path: path.clone(),
                range: range.clone(),
            });

            let listing = match session.listing(self.source, &req.name).await {
                Ok(listing) => listing,
                Err(failure) if path.is_empty() => {
                    return Err(if failure.not_found {
                        ResolveError::NotFound(req.name.to_string())
                    } else {
                        ResolveError::Index {
                            name: req.name.to_string(),
                            message: failure.message,
                        }
                    });
                }
                Err(failure) => {
                    tracing::warn!(package = %req.name, error = %failure.message, "skipping dependency");
                    return Ok(());
                }
            };

            if !self.options.follow_dependencies {
                return Ok(());
            }

            let Some(version) = version_to_expand(&listing, &range) else {
                tracing::debug!(package = %req.name, constraint = %range, "no candidate version to expand");
                return Ok(());
            };
            if !session
                .expanded
                .insert((req.name.clone(), version.clone(), req.extras.clone()))
            {
                return Ok(());
            }

            let requires = if version == listing.latest_version {
                listing.requires.clone()
            } else {
                match session.describe(self.source, &req.name, &version).await {
                    Ok(meta) => meta.requires.clone(),
                    Err(failure) => {
                        tracing::warn!(package = %req.name, %version, error = %failure.message, "skipping dependency");
                        return Ok(());
                    }
                }
            };
            tracing::debug!(package = %req.name, %version, count = requires.len(), "expanding");

            let mut child_path = path;
            child_path.push(req.name.clone());
            for text in &requires {
                let dep = match PackageRequirement::parse(text) {
                    Ok(dep) => dep,
                    Err(e) => {
                        tracing::warn!(package = %req.name, requirement = %text, error = %e, "invalid requirement");
                        session.invalid.push(Conflict {
                            package: PackageName::new(declared_name(text)),
                            constraints: vec![ConflictConstraint {
                                constraint: text.clone(),
                                source: req.name.to_string(),
                            }],
                            error: Some(e.to_string()),
                        });
                        continue;
                    }
                };
                if !dep.applies_to(&self.options.environment, &req.extras) {
                    tracing::debug!(requirement = %text, "marker excludes requirement");
                    continue;
                }
                self.collect(session, dep, child_path.clone()).await?;
            }
            Ok(())
        })
    }

    async fn solve(
        &self,
        session: &mut Session,
    ) -> (
        BTreeMap<PackageName, Version>,
        Vec<Conflict>,
        BTreeMap<PackageName, Arc<PackageMetadata>>,
    ) {
        let mut resolved = BTreeMap::new();
        let mut conflicts = Vec::new();
        let mut metadata = BTreeMap::new();

        let names: Vec<PackageName> = session.records.keys().cloned().collect();
        for name in names {
            let listing = session.listing(self.source, &name).await;
            let records = &session.records[&name];
            let listing = match listing {
                Ok(listing) => listing,
                Err(failure) => {
                    conflicts.push(Conflict {
                        package: name.clone(),
                        constraints: conflict_constraints(records),
                        error: Some(failure.message),
                    });
                    continue;
                }
            };

            let versions = sorted_versions(&listing);
            let ranges: Vec<&VersionConstraint> = records.iter().map(|r| &r.range).collect();
            let chosen = highest_match(&versions, &ranges).map(|(v, _)| v.clone());
            match chosen {
                Some(version) => {
                    tracing::debug!(package = %name, %version, "selected");
                    resolved.insert(name.clone(), version);
                    metadata.insert(name, listing);
                }
                None => conflicts.push(Conflict {
                    package: name.clone(),
                    constraints: conflict_constraints(records),
                    error: None,
                }),
            }
        }
        (resolved, conflicts, metadata)
    }
}

fn conflict_constraints(records: &[ConstraintRecord]) -> Vec<ConflictConstraint> {
    records
        .iter()
        .map(|r| ConflictConstraint {
            constraint: r.constraint.clone(),
            source: r.source.clone(),
        })
        .collect()
}
