//! Version parsing for image tags
//!
//! Tags are parsed leniently compared to strict semver: a leading `v` is
//! accepted and trailing components may be missing (`v4`, `4.1`). Pre-release
//! and build suffixes are accepted but discarded, so `1.2.3-rc.1` and `1.2.3`
//! parse to the same version.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// `major` or `major.minor` with an optional pre-release/build suffix made of
/// non-empty dot-separated identifiers
static PARTIAL_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)(?:\.(0|[1-9]\d*))?(?:-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$",
    )
    .expect("partial version pattern is valid")
});

/// A version parsed from an image tag.
///
/// `minor` and `patch` are `None` for partial tags. Two versions are only
/// comparable when [`Version::same_shape`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<u64>,
}

impl Version {
    /// Create a full `major.minor.patch` version
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor: Some(minor),
            patch: Some(patch),
        }
    }

    /// Create a major-only version (e.g. tag `v4`)
    pub const fn major_only(major: u64) -> Self {
        Self {
            major,
            minor: None,
            patch: None,
        }
    }

    /// Create a `major.minor` version (e.g. tag `4.1`)
    pub const fn major_minor(major: u64, minor: u64) -> Self {
        Self {
            major,
            minor: Some(minor),
            patch: None,
        }
    }

    /// Parse a tag string, returning `None` for tags that are not versions
    pub fn parse(tag: &str) -> Option<Self> {
        let trimmed = tag.trim();
        let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);

        if let Ok(full) = semver::Version::parse(stripped) {
            return Some(Self::new(full.major, full.minor, full.patch));
        }

        let caps = PARTIAL_VERSION.captures(stripped)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = match caps.get(2) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };

        Some(Self {
            major,
            minor,
            patch: None,
        })
    }

    /// Whether both versions define the same set of components
    pub fn same_shape(&self, other: &Self) -> bool {
        self.minor.is_some() == other.minor.is_some() && self.patch.is_some() == other.patch.is_some()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{}", minor)?;
        }
        if let Some(patch) = self.patch {
            write!(f, ".{}", patch)?;
        }
        Ok(())
    }
}
