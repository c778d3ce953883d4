//! Manifest digest lookup

use crate::auth::BearerToken;
use crate::transport::{registry_base, HttpRequest, Result, Transport};
use reqwest::header::ACCEPT;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Manifest media types accepted when resolving a digest, so registries
/// answer with the index digest for multi-arch images
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.list.v2+json, \
application/vnd.docker.distribution.manifest.v2+json, \
application/vnd.oci.image.index.v1+json, \
application/vnd.oci.image.manifest.v1+json";

/// Response header carrying the manifest digest
pub const DIGEST_HEADER: &str = "docker-content-digest";

/// Resolves the remote digest of a tag
pub struct DigestChecker<'a> {
    transport: &'a dyn Transport,
    deadline: Option<Instant>,
}

impl<'a> DigestChecker<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            deadline: None,
        }
    }

    /// Abort requests once `deadline` passes
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// `HEAD` the manifest of `repository:tag` and return its digest.
    ///
    /// A registry that answers without a `docker-content-digest` header
    /// yields `Ok(None)`.
    pub async fn check_digest(
        &self,
        host: &str,
        repository: &str,
        tag: &str,
        token: Option<&BearerToken>,
        insecure: bool,
    ) -> Result<Option<String>> {
        let url = format!(
            "{}/v2/{}/manifests/{}",
            registry_base(host, insecure),
            repository,
            tag
        );
        debug!("Checking digest at {}", url);

        let request = HttpRequest::new(url.as_str())
            .deadline(self.deadline)
            .bearer(token.map(BearerToken::as_str))?
            .header(ACCEPT, MANIFEST_ACCEPT)?;

        let response = self.transport.head(request).await?;
        match response.header(DIGEST_HEADER) {
            Some(digest) => {
                debug!("Remote digest for {}:{} is {}", repository, tag, digest);
                Ok(Some(digest.to_string()))
            }
            None => {
                warn!("Registry returned no {} for {}", DIGEST_HEADER, url);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_lists_all_manifest_types() {
        let types: Vec<&str> = MANIFEST_ACCEPT.split(", ").collect();
        assert_eq!(
            types,
            vec![
                "application/vnd.docker.distribution.manifest.list.v2+json",
                "application/vnd.docker.distribution.manifest.v2+json",
                "application/vnd.oci.image.index.v1+json",
                "application/vnd.oci.image.manifest.v1+json",
            ]
        );
    }
}
