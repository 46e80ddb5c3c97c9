//! Release versions of the form `major.minor.patch[-prerelease][+build]`.
//!
//! [`Version::parse`] is strict: every numeric component must be present and
//! a malformed string is an error rather than a guessed value.
//! [`Version::parse_release`] only relaxes the component count for text read
//! from an index. Build metadata never affects precedence.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors raised while parsing a [`Version`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The input was empty or whitespace only.
    #[error("empty version string")]
    Empty,

    /// The input does not follow the `major.minor.patch` grammar.
    #[error("malformed version '{input}': {reason}")]
    Malformed {
        /// The rejected input.
        input: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// A parsed release version.
///
/// Equality is structural. Ordering is precedence first, with build
/// metadata only used to break ties so that `Ord` and `Eq` agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Dot separated prerelease identifiers (`rc.1` becomes `["rc", "1"]`).
    pub pre: Vec<String>,
    /// Dot separated build identifiers.
    pub build: Vec<String>,
}

impl Version {
    /// A release version with no prerelease or build metadata.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: Vec::new(),
        }
    }

    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if any numeric component is missing or not a
    /// non-negative integer, or if a prerelease/build identifier is empty or
    /// contains characters outside `[0-9A-Za-z-]`.
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        parse_with(text, false)
    }

    /// Parse a release that may omit trailing components, as index listings
    /// and requirement specifiers do: `2.5` reads as `2.5.0` and `3` as
    /// `3.0.0`. Everything else is as strict as [`Version::parse`].
    ///
    /// # Errors
    ///
    /// Same as [`Version::parse`], minus the missing-component cases.
    pub fn parse_release(text: &str) -> Result<Self, VersionError> {
        parse_with(text, true)
    }

    /// Whether this version carries a prerelease tag.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Compare two versions by precedence, ignoring build metadata.
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => compare_identifier_lists(&self.pre, &other.pre),
            })
    }
}

fn parse_with(text: &str, pad: bool) -> Result<Version, VersionError> {
    let input = text.trim();
    if input.is_empty() {
        return Err(VersionError::Empty);
    }
    let malformed = |reason| VersionError::Malformed {
        input: input.to_string(),
        reason,
    };

    let (rest, build) = match input.split_once('+') {
        Some((rest, build)) => (
            rest,
            parse_identifiers(build).ok_or_else(|| malformed("invalid build metadata"))?,
        ),
        None => (input, Vec::new()),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((core, pre)) => (
            core,
            parse_identifiers(pre).ok_or_else(|| malformed("invalid prerelease"))?,
        ),
        None => (rest, Vec::new()),
    };

    let parts: Vec<&str> = core.split('.').collect();
    match parts.len() {
        1 if !pad => return Err(malformed("missing minor component")),
        2 if !pad => return Err(malformed("missing patch component")),
        n if n > 3 => return Err(malformed("too many components")),
        _ => {}
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("components must be non-negative integers"));
        }
        *slot = part
            .parse::<u64>()
            .map_err(|_| malformed("component out of range"))?;
    }
    let [major, minor, patch] = numbers;

    Ok(Version {
        major,
        minor,
        patch,
        pre,
        build,
    })
}

fn parse_identifiers(text: &str) -> Option<Vec<String>> {
    text.split('.')
        .map(|id| {
            let valid =
                !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
            valid.then(|| id.to_string())
        })
        .collect()
}

fn compare_identifier_lists(a: &[String], b: &[String]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = compare_identifiers(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    // A shorter list that is a prefix of the longer one sorts first.
    a.len().cmp(&b.len())
}

fn compare_identifiers(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| s.bytes().all(|c| c.is_ascii_digit());
    match (numeric(a), numeric(b)) {
        (true, true) => {
            let ta = a.trim_start_matches('0');
            let tb = b.trim_start_matches('0');
            ta.len()
                .cmp(&tb.len())
                .then_with(|| ta.cmp(tb))
                .then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_precedence(other)
            .then_with(|| compare_identifier_lists(&self.build, &other.build))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build.join("."))?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
