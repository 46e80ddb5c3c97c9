//! Version range expressions.
//!
//! Supported grammar: `==`, `!=`, `>=`, `<=`, `>`, `<`, `~=` clauses joined
//! by `,` (all must hold), alternatives joined by `||` (any may hold), and
//! `*` or the empty string for "any version". A bare version is treated as
//! `==`. A specifier wrapped in parentheses, as in `numpy (>=1.19.0)`, is
//! accepted. Versions may omit trailing components (`>=2.5`), which read
//! as zero.
//!
//! Prerelease versions only match a range that itself names a prerelease.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::version::{Version, VersionError};

/// Errors raised while parsing a [`VersionConstraint`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// A clause carried an operator but no version.
    #[error("missing version after '{0}'")]
    MissingVersion(String),

    /// `~=` needs at least `major.minor`.
    #[error("compatible release '{0}' needs at least two components")]
    CompatibleTooShort(String),

    /// The version inside a clause failed to parse.
    #[error("invalid version in constraint '{clause}': {source}")]
    Version {
        /// The clause that was rejected.
        clause: String,
        /// Underlying version error.
        #[source]
        source: VersionError,
    },

    /// A conjunction or disjunction had an empty member.
    #[error("empty clause in '{0}'")]
    EmptyClause(String),
}

/// A parsed version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Matches every version (`*` or empty).
    Any,
    /// `==`
    Exact(Version),
    /// `!=`
    NotEqual(Version),
    /// `>=`
    Gte(Version),
    /// `<=`
    Lte(Version),
    /// `>`
    Gt(Version),
    /// `<`
    Lt(Version),
    /// `~=`: at least the base version, with major and minor held fixed.
    Compatible(Version),
    /// Comma separated clauses that must all hold.
    All(Vec<VersionConstraint>),
    /// `||` separated ranges of which at least one must hold.
    AnyOf(Vec<VersionConstraint>),
}

const OPERATORS: [&str; 7] = ["~=", "==", "!=", ">=", "<=", ">", "<"];

impl VersionConstraint {
    /// Parse constraint text.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintError`] when a clause is empty, has an operator
    /// with no version, or names a version that does not parse.
    pub fn parse(text: &str) -> Result<Self, ConstraintError> {
        let mut trimmed = text.trim();
        while let Some(inner) = trimmed.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            trimmed = inner.trim();
        }
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::Any);
        }

        if trimmed.contains("||") {
            let members = trimmed
                .split("||")
                .map(|range| {
                    if range.trim().is_empty() {
                        Err(ConstraintError::EmptyClause(trimmed.to_string()))
                    } else {
                        Self::parse_conjunction(range)
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::AnyOf(members));
        }

        Self::parse_conjunction(trimmed)
    }

    fn parse_conjunction(text: &str) -> Result<Self, ConstraintError> {
        let text = text.trim();
        if !text.contains(',') {
            return Self::parse_clause(text);
        }
        let clauses = text
            .split(',')
            .map(|clause| {
                if clause.trim().is_empty() {
                    Err(ConstraintError::EmptyClause(text.to_string()))
                } else {
                    Self::parse_clause(clause)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::All(clauses))
    }

    fn parse_clause(clause: &str) -> Result<Self, ConstraintError> {
        let clause = clause.trim();
        if clause == "*" {
            return Ok(Self::Any);
        }

        let (op, rest) = OPERATORS
            .iter()
            .find_map(|op| clause.strip_prefix(op).map(|rest| (*op, rest)))
            .unwrap_or(("==", clause));

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(ConstraintError::MissingVersion(op.to_string()));
        }
        let version = Version::parse_release(rest).map_err(|source| ConstraintError::Version {
            clause: clause.to_string(),
            source,
        })?;

        Ok(match op {
            "~=" => match release_components(rest) {
                1 => return Err(ConstraintError::CompatibleTooShort(clause.to_string())),
                // `~=2.5` holds the major only.
                2 => Self::All(vec![
                    Self::Gte(version.clone()),
                    Self::Lt(Version::new(version.major + 1, 0, 0)),
                ]),
                _ => Self::Compatible(version),
            },
            "!=" => Self::NotEqual(version),
            ">=" => Self::Gte(version),
            "<=" => Self::Lte(version),
            ">" => Self::Gt(version),
            "<" => Self::Lt(version),
            _ => Self::Exact(version),
        })
    }

    /// Whether `version` is acceptable for this range. A prerelease is only
    /// accepted when the range names a prerelease itself.
    pub fn matches(&self, version: &Version) -> bool {
        if version.is_prerelease() && !self.names_prerelease() {
            return false;
        }
        self.contains(version)
    }

    /// Whether `version` falls inside this range, prerelease or not.
    /// Comparisons use precedence, so build metadata is ignored.
    pub fn contains(&self, version: &Version) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};

        match self {
            Self::Any => true,
            Self::Exact(v) => version.cmp_precedence(v) == Equal,
            Self::NotEqual(v) => version.cmp_precedence(v) != Equal,
            Self::Gte(v) => version.cmp_precedence(v) != Less,
            Self::Lte(v) => version.cmp_precedence(v) != Greater,
            Self::Gt(v) => version.cmp_precedence(v) == Greater,
            Self::Lt(v) => version.cmp_precedence(v) == Less,
            Self::Compatible(v) => {
                version.major == v.major
                    && version.minor == v.minor
                    && version.cmp_precedence(v) != Less
            }
            Self::All(clauses) => clauses.iter().all(|c| c.contains(version)),
            Self::AnyOf(ranges) => ranges.iter().any(|r| r.contains(version)),
        }
    }

    /// True when any clause is written against a prerelease version.
    pub fn names_prerelease(&self) -> bool {
        match self {
            Self::Any => false,
            Self::Exact(v)
            | Self::NotEqual(v)
            | Self::Gte(v)
            | Self::Lte(v)
            | Self::Gt(v)
            | Self::Lt(v)
            | Self::Compatible(v) => v.is_prerelease(),
            Self::All(members) | Self::AnyOf(members) => members.iter().any(Self::names_prerelease),
        }
    }

    /// True for the wildcard constraint.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

fn release_components(text: &str) -> usize {
    text.split(['-', '+'])
        .next()
        .map_or(0, |release| release.split('.').count())
}

/// Check `version` against constraint text.
///
/// Malformed constraint text yields `false`; this never panics.
pub fn satisfies(version: &Version, constraint: &str) -> bool {
    VersionConstraint::parse(constraint).is_ok_and(|c| c.matches(version))
}

impl FromStr for VersionConstraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "=={v}"),
            Self::NotEqual(v) => write!(f, "!={v}"),
            Self::Gte(v) => write!(f, ">={v}"),
            Self::Lte(v) => write!(f, "<={v}"),
            Self::Gt(v) => write!(f, ">{v}"),
            Self::Lt(v) => write!(f, "<{v}"),
            Self::Compatible(v) => write!(f, "~={v}"),
            Self::All(clauses) => {
                let parts: Vec<String> = clauses.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
            Self::AnyOf(ranges) => {
                let parts: Vec<String> = ranges.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(" || "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_self_constraints() {
        for s in ["0.0.1", "1.2.3", "2.0.0-rc.1", "3.4.5+local"] {
            let version = v(s);
            let core = format!("{}.{}.{}", version.major, version.minor, version.patch);
            let exact = if version.is_prerelease() {
                format!("{core}-{}", version.pre.join("."))
            } else {
                core
            };
            assert!(satisfies(&version, &format!("=={exact}")));
            assert!(satisfies(&version, &format!(">={exact}")));
            assert!(!satisfies(&version, &format!("<{exact}")));
        }
    }

    #[test]
    fn test_range_conjunction() {
        let range = ">=1.0.0,<2.0.0";
        assert!(!satisfies(&v("0.9.0"), range));
        assert!(satisfies(&v("1.0.0"), range));
        assert!(satisfies(&v("1.5.0"), range));
        assert!(!satisfies(&v("2.0.0"), range));
    }

    #[test]
    fn test_compatible_release() {
        assert!(satisfies(&v("1.4.5"), "~=1.4.2"));
        assert!(satisfies(&v("1.4.2"), "~=1.4.2"));
        assert!(!satisfies(&v("1.4.1"), "~=1.4.2"));
        assert!(!satisfies(&v("1.5.0"), "~=1.4.2"));
        assert!(!satisfies(&v("2.4.3"), "~=1.4.2"));
    }

    #[test]
    fn test_disjunction() {
        let range = "<1.0.0 || >=3.0.0";
        assert!(satisfies(&v("0.5.0"), range));
        assert!(!satisfies(&v("2.0.0"), range));
        assert!(satisfies(&v("3.1.0"), range));
    }

    #[test]
    fn test_not_equal_and_wildcard() {
        assert!(!satisfies(&v("1.0.0"), "!=1.0.0"));
        assert!(satisfies(&v("1.0.1"), ">=1.0.0, != 1.0.5"));
        assert!(satisfies(&v("9.9.9"), "*"));
        assert!(satisfies(&v("9.9.9"), ""));
    }

    #[test]
    fn test_parenthesized_and_spaced() {
        assert!(satisfies(&v("1.20.0"), "(>=1.19.0)"));
        assert!(satisfies(&v("1.20.0"), " >= 1.19.0 , < 2.0.0 "));
        assert_eq!(
            VersionConstraint::parse("1.2.3").unwrap(),
            VersionConstraint::Exact(v("1.2.3"))
        );
    }

    #[test]
    fn test_malformed_never_satisfied() {
        for bad in [">=", ">=abc", "==1.0.0.0", ">=1.0.0,", "|| 1.0.0", "~=x", "~=2"] {
            assert!(VersionConstraint::parse(bad).is_err(), "{bad}");
            assert!(!satisfies(&v("1.0.0"), bad));
        }
    }

    #[test]
    fn test_short_versions_pad() {
        let range = "<4,>=2.5";
        assert!(!satisfies(&v("2.4.9"), range));
        assert!(satisfies(&v("2.5.0"), range));
        assert!(satisfies(&v("3.7.0"), range));
        assert!(!satisfies(&v("4.0.0"), range));
        assert!(satisfies(&v("2017.4.17"), ">=2017.4.17"));
    }

    #[test]
    fn test_two_part_compatible_holds_major() {
        assert!(satisfies(&v("2.5.0"), "~=2.5"));
        assert!(satisfies(&v("2.9.1"), "~=2.5"));
        assert!(!satisfies(&v("2.4.0"), "~=2.5"));
        assert!(!satisfies(&v("3.0.0"), "~=2.5"));
    }

    #[test]
    fn test_prerelease_needs_opt_in() {
        let rc = v("2.0.0-rc.1");
        assert!(!satisfies(&rc, ">=1.0.0"));
        assert!(!satisfies(&rc, "*"));
        assert!(satisfies(&rc, ">=2.0.0-rc.0"));
        assert!(satisfies(&rc, "==2.0.0-rc.1"));

        let range = VersionConstraint::parse(">=1.0.0").unwrap();
        assert!(range.contains(&rc));
        assert!(!range.matches(&rc));
        assert!(range.matches(&v("1.5.0")));
    }

    #[test]
    fn test_display() {
        let c = VersionConstraint::parse(">=1.0.0, <2.0.0").unwrap();
        assert_eq!(c.to_string(), ">=1.0.0,<2.0.0");
        assert_eq!(VersionConstraint::parse(&c.to_string()).unwrap(), c);
    }
}
