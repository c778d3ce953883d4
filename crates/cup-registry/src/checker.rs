//! Update resolution for container images
//!
//! [`UpdateChecker`] drives one check through its stages: the current tag is
//! parsed, the registry is probed for an auth challenge (and a token fetched
//! when one is issued), the tags are listed and filtered, and the latest
//! acceptable version is selected. When the current version is already the
//! latest, the manifest digest is fetched so a rebuilt image under the same
//! tag can still be reported.
//!
//! Every failure is recorded on the returned [`ImageResult`]; `check` itself
//! never fails.

use crate::auth::{AuthNegotiator, BearerToken};
use crate::digest::DigestChecker;
use crate::tags::{TagLister, TagQuery};
use crate::transport::{ReqwestTransport, Result, Transport};
use cup_core::{
    CheckError, CupConfig, ImageReference, ImageResult, RegistryConfig, SelectionPolicy,
    UpdateType, Version,
};
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One image to check
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Image whose tag is the current version; its registry is the host queried
    pub reference: ImageReference,
    /// Digests currently deployed for this image
    pub local_digests: Vec<String>,
    /// Granularity of change to ignore
    pub ignore_update_type: UpdateType,
    /// Registry settings overriding the configured entry for this host
    pub registry_config: Option<RegistryConfig>,
    /// Abort the check's requests once this instant passes
    pub deadline: Option<Instant>,
}

impl CheckRequest {
    pub fn new(
        registry: impl Into<String>,
        owner: impl AsRef<str>,
        repo: impl AsRef<str>,
        tag: impl Into<String>,
    ) -> Self {
        Self::from_reference(ImageReference::new(registry, owner, repo, tag))
    }

    pub fn from_reference(reference: ImageReference) -> Self {
        Self {
            reference,
            local_digests: Vec::new(),
            ignore_update_type: UpdateType::None,
            registry_config: None,
            deadline: None,
        }
    }

    pub fn local_digests<I, S>(mut self, digests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local_digests = digests.into_iter().map(Into::into).collect();
        self
    }

    pub fn ignore_update_type(mut self, ignore: UpdateType) -> Self {
        self.ignore_update_type = ignore;
        self
    }

    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = Some(config);
        self
    }

    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    fn initial_result(&self) -> ImageResult {
        ImageResult::new(self.reference.clone(), self.local_digests.iter().cloned())
    }

    fn base_version(&self) -> std::result::Result<Version, CheckError> {
        Version::parse(&self.reference.tag).ok_or_else(|| CheckError::InvalidTag {
            tag: self.reference.tag.clone(),
        })
    }
}

/// Outcome of choosing among the candidate versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A different version should be reported as the latest
    Newer(Version),
    /// The current version is the latest; its digest decides
    Current,
    /// No candidate survived filtering
    Nothing,
}

/// Choose the latest version among `candidates` (in registry order)
pub fn select_latest(candidates: &[Version], base: &Version, policy: SelectionPolicy) -> Selection {
    let latest = match policy {
        SelectionPolicy::Newest => candidates.iter().filter(|v| *v > base).max(),
        SelectionPolicy::FirstListed => candidates.iter().find(|v| *v != base),
    };

    match latest {
        Some(version) => Selection::Newer(*version),
        None if candidates.contains(base) => Selection::Current,
        None => Selection::Nothing,
    }
}

/// Checks images for newer tags or rebuilt digests
pub struct UpdateChecker {
    transport: Arc<dyn Transport>,
    config: CupConfig,
}

impl UpdateChecker {
    /// Create a checker with an HTTP transport built from `config`
    pub fn new(config: CupConfig) -> Result<Self> {
        let transport =
            ReqwestTransport::new(&config.user_agent)?.with_timeout(config.http_timeout());
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Create a checker over an existing transport
    pub fn with_transport(transport: Arc<dyn Transport>, config: CupConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &CupConfig {
        &self.config
    }

    /// Check one image
    pub async fn check(&self, request: CheckRequest) -> ImageResult {
        let reference = &request.reference;
        info!("Checking {}", reference);

        let base = match request.base_version() {
            Ok(base) => base,
            Err(e) => return fail(request.initial_result(), reference, e),
        };

        let registry = self.registry_for(&request);
        let token = match self
            .authenticate(
                &registry,
                &reference.registry,
                &[reference.repository.as_str()],
                request.deadline,
            )
            .await
        {
            Ok(token) => token,
            Err(e) => return fail(request.initial_result(), reference, e),
        };

        self.resolve(&request, &registry, token.as_ref(), base).await
    }

    /// Check several images, fetching one token per registry.
    ///
    /// Results are returned in request order.
    pub async fn check_all(&self, requests: Vec<CheckRequest>) -> Vec<ImageResult> {
        let mut results: Vec<(usize, ImageResult)> = Vec::with_capacity(requests.len());
        let mut groups: Vec<(String, RegistryConfig, Vec<(usize, CheckRequest, Version)>)> =
            Vec::new();

        for (index, request) in requests.into_iter().enumerate() {
            let base = match request.base_version() {
                Ok(base) => base,
                Err(e) => {
                    results.push((index, fail(request.initial_result(), &request.reference, e)));
                    continue;
                }
            };

            let host = request.reference.registry.clone();
            let registry = self.registry_for(&request);
            match groups
                .iter_mut()
                .find(|(h, r, _)| *h == host && *r == registry)
            {
                Some((_, _, members)) => members.push((index, request, base)),
                None => groups.push((host, registry, vec![(index, request, base)])),
            }
        }

        let batches = groups
            .iter()
            .map(|(host, registry, members)| self.check_group(host, registry, members));
        results.extend(join_all(batches).await.into_iter().flatten());

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    async fn check_group(
        &self,
        host: &str,
        registry: &RegistryConfig,
        members: &[(usize, CheckRequest, Version)],
    ) -> Vec<(usize, ImageResult)> {
        let mut repositories: Vec<&str> = members
            .iter()
            .map(|(_, request, _)| request.reference.repository.as_str())
            .collect();
        repositories.sort_unstable();
        repositories.dedup();

        let deadline = members.iter().filter_map(|(_, r, _)| r.deadline).min();
        info!(
            "Checking {} images on {} ({} repositories)",
            members.len(),
            host,
            repositories.len()
        );

        let token = self
            .authenticate(registry, host, &repositories, deadline)
            .await;
        let token = &token;

        let checks = members.iter().map(move |(index, request, base)| async move {
            let result = match token {
                Ok(token) => self.resolve(request, registry, token.as_ref(), *base).await,
                Err(e) => fail(request.initial_result(), &request.reference, e.clone()),
            };
            (*index, result)
        });

        join_all(checks).await
    }

    /// Settings for the request's registry
    fn registry_for(&self, request: &CheckRequest) -> RegistryConfig {
        request
            .registry_config
            .clone()
            .unwrap_or_else(|| self.config.registry(&request.reference.registry))
    }

    /// Obtain a token for `repositories`, or `None` for anonymous access
    async fn authenticate(
        &self,
        registry: &RegistryConfig,
        host: &str,
        repositories: &[&str],
        deadline: Option<Instant>,
    ) -> Result<Option<BearerToken>> {
        if let Some(token) = &registry.token {
            debug!("Using configured token for {}", host);
            return Ok(Some(BearerToken::new(token.clone())));
        }

        let negotiator = AuthNegotiator::new(self.transport.as_ref()).with_deadline(deadline);
        match negotiator.probe(host, registry.insecure).await? {
            Some(challenge) => {
                let token = negotiator
                    .exchange(&challenge, repositories, registry.credentials())
                    .await?;
                debug!("Authenticated to {}", host);
                Ok(Some(token))
            }
            None => {
                debug!("Anonymous access to {}", host);
                Ok(None)
            }
        }
    }

    /// List, select and (when needed) check the digest of one image
    async fn resolve(
        &self,
        request: &CheckRequest,
        registry: &RegistryConfig,
        token: Option<&BearerToken>,
        base: Version,
    ) -> ImageResult {
        let reference = &request.reference;
        let result = request.initial_result();

        let query = TagQuery::new(&reference.registry, &reference.repository, base)
            .token(token)
            .ignore_update_type(request.ignore_update_type)
            .insecure(registry.insecure)
            .max_pages(self.config.max_pages);

        let candidates = match TagLister::new(self.transport.as_ref())
            .with_deadline(request.deadline)
            .list_tags(&query)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => return fail(result, reference, e),
        };

        match select_latest(&candidates, &base, self.config.selection_policy) {
            Selection::Newer(latest) => {
                info!("{}: version {} available", reference, latest);
                result.with_latest(base, latest)
            }
            Selection::Current => {
                debug!("{}: current version is the latest, checking digest", reference);
                let digest = DigestChecker::new(self.transport.as_ref())
                    .with_deadline(request.deadline)
                    .check_digest(
                        &reference.registry,
                        &reference.repository,
                        &reference.tag,
                        token,
                        registry.insecure,
                    )
                    .await;

                match digest {
                    Ok(remote) => result.with_remote_digest(base, remote),
                    Err(e) => fail(result, reference, e),
                }
            }
            Selection::Nothing => fail(result, reference, CheckError::NoNewerTag),
        }
    }
}

fn fail(result: ImageResult, reference: &ImageReference, error: CheckError) -> ImageResult {
    warn!("Check of {} failed: {}", reference, error);
    result.with_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpRequest, HttpResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn versions(list: &[(u64, u64, u64)]) -> Vec<Version> {
        list.iter()
            .map(|(major, minor, patch)| Version::new(*major, *minor, *patch))
            .collect()
    }

    #[test]
    fn test_request_debug_hides_credentials() {
        let request = CheckRequest::new("ghcr.io", "owner", "app", "1.0.0")
            .registry_config(RegistryConfig::new("ghcr.io").with_credentials("octocat", "hunter2"));
        let debug = format!("{:?}", request);
        assert!(debug.contains("octocat"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_newest_picks_maximum() {
        let candidates = versions(&[(1, 0, 0), (1, 1, 0), (2, 0, 0)]);
        assert_eq!(
            select_latest(&candidates, &Version::new(1, 0, 0), SelectionPolicy::Newest),
            Selection::Newer(Version::new(2, 0, 0))
        );
    }

    #[test]
    fn test_newest_ignores_older_candidates() {
        let candidates = versions(&[(0, 9, 0), (1, 0, 0)]);
        assert_eq!(
            select_latest(&candidates, &Version::new(1, 0, 0), SelectionPolicy::Newest),
            Selection::Current
        );
        assert_eq!(
            select_latest(&candidates, &Version::new(1, 5, 0), SelectionPolicy::Newest),
            Selection::Nothing
        );
    }

    #[test]
    fn test_first_listed_picks_first_different() {
        let candidates = versions(&[(1, 0, 0), (1, 1, 0), (2, 0, 0)]);
        assert_eq!(
            select_latest(&candidates, &Version::new(1, 0, 0), SelectionPolicy::FirstListed),
            Selection::Newer(Version::new(1, 1, 0))
        );
    }

    #[test]
    fn test_only_base_listed_selects_current() {
        let candidates = versions(&[(1, 0, 0)]);
        for policy in [SelectionPolicy::Newest, SelectionPolicy::FirstListed] {
            assert_eq!(
                select_latest(&candidates, &Version::new(1, 0, 0), policy),
                Selection::Current
            );
        }
    }

    #[test]
    fn test_empty_candidates_select_nothing() {
        for policy in [SelectionPolicy::Newest, SelectionPolicy::FirstListed] {
            assert_eq!(
                select_latest(&[], &Version::new(1, 0, 0), policy),
                Selection::Nothing
            );
        }
    }

    /// Transport that fails every request and counts them
    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn get(&self, request: HttpRequest, _: bool) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CheckError::transport(format!("unreachable: {}", request.url)))
        }

        async fn head(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CheckError::transport(format!("unreachable: {}", request.url)))
        }
    }

    #[tokio::test]
    async fn test_invalid_tag_makes_no_requests() {
        let transport = Arc::new(CountingTransport::default());
        let checker = UpdateChecker::with_transport(transport.clone(), CupConfig::default());

        let result = checker
            .check(CheckRequest::new("ghcr.io", "owner", "app", "latest"))
            .await;

        assert_eq!(
            result.error,
            Some(CheckError::InvalidTag {
                tag: "latest".to_string()
            })
        );
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_network_failure_is_recorded() {
        let transport = Arc::new(CountingTransport::default());
        let checker = UpdateChecker::with_transport(transport.clone(), CupConfig::default());

        let result = checker
            .check(CheckRequest::new("ghcr.io", "owner", "app", "1.0.0").local_digests(["sha256:aaa"]))
            .await;

        assert!(matches!(result.error, Some(CheckError::Transport { .. })));
        assert!(result.version_info.is_none());
        assert!(result.digest_info.unwrap().local_digests.contains("sha256:aaa"));
        // Probe failure stops the check
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_all_keeps_order_and_reports_invalid_tags() {
        let transport = Arc::new(CountingTransport::default());
        let checker = UpdateChecker::with_transport(transport.clone(), CupConfig::default());

        let results = checker
            .check_all(vec![
                CheckRequest::new("ghcr.io", "owner", "one", "1.0.0"),
                CheckRequest::new("ghcr.io", "owner", "two", "main"),
                CheckRequest::new("quay.io", "owner", "three", "2.0.0"),
            ])
            .await;

        let names: Vec<&str> = results
            .iter()
            .map(|r| r.reference.repository.as_str())
            .collect();
        assert_eq!(names, vec!["owner/one", "owner/two", "owner/three"]);
        assert!(matches!(results[1].error, Some(CheckError::InvalidTag { .. })));
        // One probe per registry
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }
}
