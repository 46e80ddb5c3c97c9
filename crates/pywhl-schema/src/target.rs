//! The runtime and platform a download is aimed at.
//!
//! ```
//! use pywhl_schema::{PythonVersion, TargetPlatform};
//!
//! let python: PythonVersion = "3.11".parse().unwrap();
//! assert_eq!(python.cp_tag(), "cp311");
//!
//! let platform = TargetPlatform::new("macosx_12_0_arm64");
//! assert_eq!(platform.arch(), Some("arm64"));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected runtime version text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid python version '{0}': expected MAJOR.MINOR[.MICRO]")]
pub struct PythonVersionError(String);

/// Target interpreter version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PythonVersion {
    /// Major version (`3`).
    pub major: u32,
    /// Minor version (`11`).
    pub minor: u32,
    /// Micro version, when known.
    pub micro: Option<u32>,
}

impl PythonVersion {
    /// Build from major and minor.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            micro: None,
        }
    }

    /// `cpXY` tag for this version.
    pub fn cp_tag(&self) -> String {
        format!("cp{}{}", self.major, self.minor)
    }

    /// `pyXY` tag for this version.
    pub fn py_tag(&self) -> String {
        format!("py{}{}", self.major, self.minor)
    }

    /// `pyX` tag for this version's major line.
    pub fn major_tag(&self) -> String {
        format!("py{}", self.major)
    }

    /// `X.Y` form, as used by the `python_version` marker.
    pub fn short(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// `X.Y.Z` form, as used by the `python_full_version` marker.
    pub fn full(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.micro.unwrap_or(0))
    }
}

impl Default for PythonVersion {
    fn default() -> Self {
        Self::new(3, 9)
    }
}

impl FromStr for PythonVersion {
    type Err = PythonVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PythonVersionError(s.to_string());
        let mut parts = s.trim().split('.');
        let mut num = |required: bool| -> Result<Option<u32>, PythonVersionError> {
            match parts.next() {
                Some(p) => p.parse().map(Some).map_err(|_| err()),
                None if required => Err(err()),
                None => Ok(None),
            }
        };
        let major = num(true)?.ok_or_else(err)?;
        let minor = num(true)?.ok_or_else(err)?;
        let micro = num(false)?;
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self {
            major,
            minor,
            micro,
        })
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.micro {
            Some(micro) => write!(f, "{}.{}.{micro}", self.major, self.minor),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

/// Operating system family of a platform tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformFamily {
    /// Plain `linux_*` tags.
    Linux,
    /// glibc compatible `manylinux*` tags.
    ManyLinux,
    /// musl compatible `musllinux*` tags.
    MuslLinux,
    /// `macosx_M_N_*` tags with their minimum OS version.
    MacOs {
        /// Major OS version.
        major: u32,
        /// Minor OS version.
        minor: u32,
    },
    /// `win32` and `win_*` tags.
    Windows,
    /// The platform-independent `any` tag.
    Any,
    /// Anything else.
    Other,
}

/// Architecture suffixes recognised on platform tags. Longer names first so
/// `ppc64le` is not read as `ppc64`.
const ARCHES: [&str; 12] = [
    "universal2",
    "universal",
    "x86_64",
    "aarch64",
    "ppc64le",
    "ppc64",
    "armv7l",
    "s390x",
    "arm64",
    "intel",
    "amd64",
    "i686",
];

/// A target platform tag such as `manylinux_2_17_x86_64` or
/// `macosx_12_0_arm64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetPlatform(String);

impl TargetPlatform {
    /// Wrap a platform tag as given.
    pub fn new(tag: &str) -> Self {
        Self(tag.trim().to_string())
    }

    /// Platform of the running machine.
    pub fn current() -> Self {
        Self(current_tag(std::env::consts::OS, std::env::consts::ARCH))
    }

    /// Return the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Family of this tag.
    pub fn family(&self) -> PlatformFamily {
        platform_family(&self.0)
    }

    /// Architecture suffix of this tag.
    pub fn arch(&self) -> Option<&str> {
        platform_arch(&self.0)
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TargetPlatform {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Platform tag for an OS/arch pair as reported by `std::env::consts`.
pub fn current_tag(os: &str, arch: &str) -> String {
    match os {
        "macos" => {
            let arch = if arch == "aarch64" { "arm64" } else { "x86_64" };
            format!("macosx_12_0_{arch}")
        }
        "windows" => match arch {
            "x86" => "win32".to_string(),
            "aarch64" => "win_arm64".to_string(),
            _ => "win_amd64".to_string(),
        },
        "linux" => {
            let arch = match arch {
                "x86" => "i686",
                other => other,
            };
            format!("linux_{arch}")
        }
        other => format!("{other}_{arch}"),
    }
}

/// Classify a single platform tag.
pub fn platform_family(tag: &str) -> PlatformFamily {
    if tag == "any" {
        PlatformFamily::Any
    } else if tag.starts_with("manylinux") {
        PlatformFamily::ManyLinux
    } else if tag.starts_with("musllinux") {
        PlatformFamily::MuslLinux
    } else if tag.starts_with("linux") {
        PlatformFamily::Linux
    } else if tag == "win32" || tag.starts_with("win_") {
        PlatformFamily::Windows
    } else if let Some((major, minor)) = macos_version(tag) {
        PlatformFamily::MacOs { major, minor }
    } else {
        PlatformFamily::Other
    }
}

/// Minimum OS version embedded in a `macosx_M_N_arch` tag.
pub fn macos_version(tag: &str) -> Option<(u32, u32)> {
    let mut parts = tag.strip_prefix("macosx_")?.splitn(3, '_');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    parts.next()?;
    Some((major, minor))
}

/// Architecture suffix of a platform tag (`x86_64`, `arm64`, ...).
pub fn platform_arch(tag: &str) -> Option<&str> {
    if tag == "win32" {
        return Some("x86");
    }
    ARCHES
        .iter()
        .find(|arch| {
            tag.strip_suffix(**arch)
                .is_some_and(|head| head.ends_with('_'))
        })
        .copied()
}
