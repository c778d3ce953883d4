//! Update granularity and latest-tag selection policy

use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity of version change the caller wants to ignore.
///
/// `Minor` means "ignore minor (and major) bumps": only patch releases within
/// the same `major.minor` are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateType {
    /// Consider every tag
    #[default]
    None,
    /// Stay on the current major
    Major,
    /// Stay on the current major.minor
    Minor,
    /// Only the exact current version
    Patch,
}

impl UpdateType {
    /// Whether `candidate` survives this filter relative to `base`
    pub fn permits(&self, base: &Version, candidate: &Version) -> bool {
        match self {
            UpdateType::None => true,
            UpdateType::Major => candidate.major == base.major,
            UpdateType::Minor => candidate.major == base.major && candidate.minor == base.minor,
            UpdateType::Patch => {
                candidate.major == base.major
                    && candidate.minor == base.minor
                    && candidate.patch == base.patch
            }
        }
    }
}

impl FromStr for UpdateType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            other => Err(Error::invalid_update_type(other)),
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateType::None => "none",
            UpdateType::Major => "major",
            UpdateType::Minor => "minor",
            UpdateType::Patch => "patch",
        };
        f.write_str(name)
    }
}

/// Which component changed between the current and the latest version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    Major,
    Minor,
    Patch,
}

impl UpdateKind {
    /// Classify the change from `current` to `latest`; `None` unless `latest` is newer
    pub fn between(current: &Version, latest: &Version) -> Option<Self> {
        if latest <= current {
            return None;
        }
        if latest.major != current.major {
            Some(Self::Major)
        } else if latest.minor != current.minor {
            Some(Self::Minor)
        } else {
            Some(Self::Patch)
        }
    }
}

/// How the latest tag is chosen among the filtered candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Highest candidate greater than the current version
    #[default]
    Newest,
    /// First candidate in registry order that differs from the current version
    FirstListed,
}

impl FromStr for SelectionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "first-listed" | "first_listed" => Ok(Self::FirstListed),
            other => Err(Error::invalid_selection_policy(other)),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::Newest => f.write_str("newest"),
            SelectionPolicy::FirstListed => f.write_str("first-listed"),
        }
    }
}
