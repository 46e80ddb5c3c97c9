//! Data model shared by the pywhl crates: versions and ranges, wheel tags,
//! requirement strings, environment markers and index metadata shapes.
//!
//! Nothing here performs IO.

pub mod constraint;
pub mod hash;
pub mod marker;
pub mod requirement;
pub mod tag;
pub mod target;
pub mod types;
pub mod version;

// Re-exports
pub use constraint::{ConstraintError, VersionConstraint, satisfies};
pub use hash::{CacheKey, Sha256Digest, sanitize_filename};
pub use marker::{Marker, MarkerEnvironment, MarkerError};
pub use requirement::{PackageRequirement, RequirementError, RequirementsFile};
pub use tag::{ArtifactTag, TagError};
pub use target::{PlatformFamily, PythonVersion, TargetPlatform};
pub use types::*;
pub use version::{Version, VersionError};
