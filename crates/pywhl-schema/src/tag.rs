//! Wheel filename tags.
//!
//! A wheel file is named
//! `{distribution}-{version}(-{build})?-{runtime}-{abi}-{platform}.whl`.
//! Each tag segment may be a compressed set joined by `.`, for example
//! `py2.py3` or `manylinux_2_17_x86_64.manylinux2014_x86_64`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing an artifact filename.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// The filename does not follow the wheel grammar.
    #[error("invalid artifact filename: {0}")]
    InvalidFilename(String),
}

/// Structured tags parsed from a wheel filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactTag {
    /// Distribution name as spelled in the filename.
    pub distribution: String,
    /// Version text as spelled in the filename.
    pub version: String,
    /// Optional build tag; must start with a digit.
    pub build_tag: Option<String>,
    /// Runtime tag set (`cp311`, `py3`, `py2.py3`).
    pub runtime_tag: String,
    /// ABI tag set (`cp311`, `abi3`, `none`).
    pub abi_tag: String,
    /// Platform tag set (`any`, `win_amd64`, `manylinux_2_17_x86_64`).
    pub platform_tag: String,
}

impl ArtifactTag {
    /// Parse a wheel filename.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::InvalidFilename`] unless the name ends in `.whl`
    /// and has five or six non-empty dash separated segments.
    pub fn parse(filename: &str) -> Result<Self, TagError> {
        let invalid = || TagError::InvalidFilename(filename.to_string());

        let stem = filename.strip_suffix(".whl").ok_or_else(invalid)?;
        let parts: Vec<&str> = stem.split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let (distribution, version, build_tag, runtime, abi, platform) = match parts.as_slice() {
            [d, v, r, a, p] => (*d, *v, None, *r, *a, *p),
            [d, v, b, r, a, p] => {
                if !b.starts_with(|c: char| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                (*d, *v, Some((*b).to_string()), *r, *a, *p)
            }
            _ => return Err(invalid()),
        };

        Ok(Self {
            distribution: distribution.to_string(),
            version: version.to_string(),
            build_tag,
            runtime_tag: runtime.to_string(),
            abi_tag: abi.to_string(),
            platform_tag: platform.to_string(),
        })
    }

    /// Members of the runtime tag set.
    pub fn runtimes(&self) -> impl Iterator<Item = &str> {
        self.runtime_tag.split('.')
    }

    /// Members of the ABI tag set.
    pub fn abis(&self) -> impl Iterator<Item = &str> {
        self.abi_tag.split('.')
    }

    /// Members of the platform tag set.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platform_tag.split('.')
    }

    /// True when the only platform is `any`.
    pub fn is_any_platform(&self) -> bool {
        self.platforms().all(|p| p == "any")
    }

    /// True for free-threaded builds, marked by a trailing `t` on a
    /// `cpXY` runtime or ABI tag (`cp313t`).
    pub fn is_free_threaded(&self) -> bool {
        self.runtimes().chain(self.abis()).any(is_free_threaded_tag)
    }
}

fn is_free_threaded_tag(tag: &str) -> bool {
    tag.strip_prefix("cp")
        .and_then(|rest| rest.strip_suffix('t'))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

impl fmt::Display for ArtifactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.distribution, self.version)?;
        if let Some(build) = &self.build_tag {
            write!(f, "-{build}")?;
        }
        write!(
            f,
            "-{}-{}-{}.whl",
            self.runtime_tag, self.abi_tag, self.platform_tag
        )
    }
}
