//! Dependency declarations such as `requests[socks] (>=2.0.0,<3.0.0) ;
//! python_version >= "3.8"` and requirements files built from them.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::constraint::{ConstraintError, VersionConstraint};
use crate::marker::{Marker, MarkerEnvironment, MarkerError};
use crate::types::PackageName;

static REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[([^\]]*)\])?\s*([^;]*?)\s*(?:;\s*(.*?))?\s*$",
    )
    .expect("requirement pattern is valid")
});

/// Errors raised while parsing a requirement string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequirementError {
    /// The text does not start with a package name.
    #[error("invalid requirement '{0}'")]
    Invalid(String),

    /// The version specifier did not parse.
    #[error("invalid version specifier in '{requirement}': {source}")]
    Constraint {
        /// The full requirement text.
        requirement: String,
        /// Underlying constraint error.
        #[source]
        source: ConstraintError,
    },

    /// The environment marker did not parse.
    #[error("invalid marker in '{requirement}': {source}")]
    Marker {
        /// The full requirement text.
        requirement: String,
        /// Underlying marker error.
        #[source]
        source: MarkerError,
    },
}

/// A parsed dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequirement {
    /// Normalized package name.
    pub name: PackageName,
    /// Requested extras, normalized.
    pub extras: Vec<String>,
    /// Version range, if one was given.
    pub constraint: Option<VersionConstraint>,
    /// Environment marker, if one was given.
    pub marker: Option<Marker>,
}

impl PackageRequirement {
    /// Parse a requirement string.
    ///
    /// # Errors
    ///
    /// Returns [`RequirementError`] when the name is missing or when the
    /// version specifier or marker is malformed.
    pub fn parse(text: &str) -> Result<Self, RequirementError> {
        let caps = REQUIREMENT
            .captures(text)
            .ok_or_else(|| RequirementError::Invalid(text.to_string()))?;

        let name = PackageName::new(&caps[1]);
        let extras = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(|e| PackageName::new(e).to_string())
                    .collect()
            })
            .unwrap_or_default();

        let spec = caps.get(3).map_or("", |m| m.as_str().trim());
        let constraint = match VersionConstraint::parse(spec) {
            Ok(VersionConstraint::Any) => None,
            Ok(c) => Some(c),
            Err(source) => {
                return Err(RequirementError::Constraint {
                    requirement: text.trim().to_string(),
                    source,
                });
            }
        };

        let marker = caps
            .get(4)
            .map(|m| m.as_str().trim())
            .filter(|m| !m.is_empty())
            .map(Marker::parse)
            .transpose()
            .map_err(|source| RequirementError::Marker {
                requirement: text.trim().to_string(),
                source,
            })?;

        Ok(Self {
            name,
            extras,
            constraint,
            marker,
        })
    }

    /// Constraint text for records and display; `*` when unconstrained.
    pub fn constraint_text(&self) -> String {
        self.constraint
            .as_ref()
            .map_or_else(|| "*".to_string(), ToString::to_string)
    }

    /// Whether this requirement applies to `env` given the extras requested
    /// of the package that declared it. Requirements without a marker always
    /// apply.
    pub fn applies_to(&self, env: &MarkerEnvironment, parent_extras: &[String]) -> bool {
        self.marker
            .as_ref()
            .is_none_or(|m| m.evaluate(env, parent_extras))
    }
}

impl FromStr for PackageRequirement {
    type Err = RequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if let Some(c) = &self.constraint {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Parsed contents of a requirements file.
#[derive(Debug, Default)]
pub struct RequirementsFile {
    /// One entry per requirement line, with its 1-based line number.
    pub entries: Vec<(usize, Result<PackageRequirement, RequirementError>)>,
    /// Option lines (`-r other.txt`, `--index-url ...`) that were skipped.
    pub skipped: Vec<(usize, String)>,
}

impl RequirementsFile {
    /// Parse requirements file text. Comments and blank lines are dropped,
    /// trailing `\` joins lines, and every remaining line is parsed on its
    /// own so one bad line never hides the rest.
    pub fn parse(text: &str) -> Self {
        let mut file = Self::default();
        let mut pending = String::new();
        let mut start = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line = strip_comment(raw);
            if pending.is_empty() {
                start = idx + 1;
            }
            if let Some(head) = line.strip_suffix('\\') {
                pending.push_str(head);
                pending.push(' ');
                continue;
            }
            pending.push_str(line);
            let joined = std::mem::take(&mut pending);
            let joined = joined.trim();

            if joined.is_empty() {
                continue;
            }
            if joined.starts_with('-') {
                file.skipped.push((start, joined.to_string()));
                continue;
            }
            file.entries
                .push((start, PackageRequirement::parse(joined)));
        }
        file
    }

    /// Successfully parsed requirements in file order.
    pub fn requirements(&self) -> impl Iterator<Item = &PackageRequirement> {
        self.entries.iter().filter_map(|(_, r)| r.as_ref().ok())
    }
}

fn strip_comment(line: &str) -> &str {
    let line = line.trim_end();
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #").or_else(|| line.find("\t#")) {
        Some(idx) => line[..idx].trim_end(),
        None => line,
    }
}
