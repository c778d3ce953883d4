//! Image reference and check result types

use crate::error::{CheckError, Error, Result};
use crate::types::UpdateKind;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Registry used when a reference names none
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Container image reference (registry, repository and tag)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g., "steveiliop56/tinyauth")
    pub repository: String,
    /// Tag (e.g., "v4.0")
    pub tag: String,
}

impl ImageReference {
    /// Build a reference from its parts
    pub fn new(
        registry: impl Into<String>,
        owner: impl AsRef<str>,
        repo: impl AsRef<str>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            repository: format!("{}/{}", owner.as_ref(), repo.as_ref()),
            tag: tag.into(),
        }
    }

    /// Parse a reference string like "ghcr.io/owner/repo:v1.2.3"
    ///
    /// The registry defaults to `docker.io` and the tag to `latest`. Docker
    /// Hub official images get the `library/` namespace.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.contains('@') {
            return Err(Error::invalid_reference(s));
        }

        // A ':' after the last '/' separates the tag; earlier ones are ports
        let (name, tag) = match s.rfind(':') {
            Some(idx) if !s[idx..].contains('/') => (&s[..idx], &s[idx + 1..]),
            _ => (s, "latest"),
        };
        if name.is_empty() || tag.is_empty() {
            return Err(Error::invalid_reference(s));
        }

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            _ => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        };
        if repository.is_empty() || repository.ends_with('/') {
            return Err(Error::invalid_reference(s));
        }

        let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
            format!("library/{}", repository)
        } else {
            repository
        };

        Ok(Self {
            registry,
            repository,
            tag: tag.to_string(),
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// Locally deployed digests and the digest the registry reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestInfo {
    /// Digests currently deployed, as supplied by the caller
    pub local_digests: BTreeSet<String>,
    /// `docker-content-digest` of the current tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_digest: Option<String>,
}

impl DigestInfo {
    pub fn new<I, S>(local_digests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            local_digests: local_digests.into_iter().map(Into::into).collect(),
            remote_digest: None,
        }
    }

    /// Whether the remote digest is known and matches none of the local ones.
    ///
    /// Local digests may be given in `RepoDigests` form
    /// (`ghcr.io/owner/repo@sha256:...`); only the part after `@` is compared.
    pub fn has_update(&self) -> bool {
        let Some(remote) = &self.remote_digest else {
            return false;
        };
        if self.local_digests.is_empty() {
            return false;
        }
        !self
            .local_digests
            .iter()
            .map(|d| d.rsplit_once('@').map_or(d.as_str(), |(_, digest)| digest))
            .any(|d| d == remote)
    }
}

/// Current version and the latest acceptable remote version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub current_tag: Version,
    /// `None` when the current version is already the latest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_remote_tag: Option<Version>,
}

impl VersionInfo {
    /// Latest tag formatted with a `v` prefix, e.g. `v1.2.3`
    pub fn format_latest(&self) -> Option<String> {
        self.latest_remote_tag.map(|v| format!("v{}", v))
    }

    /// Kind of update between current and latest, if latest is newer
    pub fn update_kind(&self) -> Option<UpdateKind> {
        self.latest_remote_tag
            .as_ref()
            .and_then(|latest| UpdateKind::between(&self.current_tag, latest))
    }
}

/// Overall verdict for one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "kind")]
pub enum UpdateStatus {
    UpToDate,
    /// A newer version tag is available
    Version(UpdateKind),
    /// Same tag, different content
    Digest,
    /// The check failed
    Unknown,
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStatus::UpToDate => f.write_str("up to date"),
            UpdateStatus::Version(UpdateKind::Major) => f.write_str("major update"),
            UpdateStatus::Version(UpdateKind::Minor) => f.write_str("minor update"),
            UpdateStatus::Version(UpdateKind::Patch) => f.write_str("patch update"),
            UpdateStatus::Digest => f.write_str("digest update"),
            UpdateStatus::Unknown => f.write_str("unknown"),
        }
    }
}

/// Result of checking one image; each stage returns an updated copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageResult {
    pub reference: ImageReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest_info: Option<DigestInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_info: Option<VersionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CheckError>,
}

impl ImageResult {
    /// Fresh result carrying the caller's local digests
    pub fn new<I, S>(reference: ImageReference, local_digests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reference,
            digest_info: Some(DigestInfo::new(local_digests)),
            version_info: None,
            error: None,
        }
    }

    /// Record a failure; any version information gathered so far is dropped
    pub fn with_error(mut self, error: CheckError) -> Self {
        self.version_info = None;
        self.error = Some(error);
        self
    }

    /// Record a newer version
    pub fn with_latest(mut self, current: Version, latest: Version) -> Self {
        self.version_info = Some(VersionInfo {
            current_tag: current,
            latest_remote_tag: Some(latest),
        });
        self
    }

    /// Record that the current version is the latest and what its remote digest is
    pub fn with_remote_digest(mut self, current: Version, remote_digest: Option<String>) -> Self {
        self.version_info = Some(VersionInfo {
            current_tag: current,
            latest_remote_tag: None,
        });
        self.digest_info.get_or_insert_with(DigestInfo::default).remote_digest = remote_digest;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Derive the update verdict
    pub fn status(&self) -> UpdateStatus {
        if self.error.is_some() {
            return UpdateStatus::Unknown;
        }
        if let Some(kind) = self.version_info.as_ref().and_then(VersionInfo::update_kind) {
            return UpdateStatus::Version(kind);
        }
        if self.digest_info.as_ref().is_some_and(DigestInfo::has_update) {
            return UpdateStatus::Digest;
        }
        if self.version_info.is_some() {
            UpdateStatus::UpToDate
        } else {
            UpdateStatus::Unknown
        }
    }
}
