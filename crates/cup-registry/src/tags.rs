//! Tag listing with pagination and version filtering

use crate::auth::BearerToken;
use crate::transport::{registry_base, HttpRequest, Result, Transport};
use cup_core::{UpdateType, Version};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::collections::HashSet;
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

/// Page cap used when the caller does not configure one
pub const DEFAULT_MAX_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Parameters of one tag listing
#[derive(Debug, Clone)]
pub struct TagQuery<'q> {
    pub host: &'q str,
    pub repository: &'q str,
    pub token: Option<&'q BearerToken>,
    /// Version the candidates are compared against
    pub base: Version,
    pub ignore_update_type: UpdateType,
    pub insecure: bool,
    pub max_pages: usize,
}

impl<'q> TagQuery<'q> {
    pub fn new(host: &'q str, repository: &'q str, base: Version) -> Self {
        Self {
            host,
            repository,
            token: None,
            base,
            ignore_update_type: UpdateType::None,
            insecure: false,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn token(mut self, token: Option<&'q BearerToken>) -> Self {
        self.token = token;
        self
    }

    pub fn ignore_update_type(mut self, ignore: UpdateType) -> Self {
        self.ignore_update_type = ignore;
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// Lists and filters the tags of a repository
pub struct TagLister<'a> {
    transport: &'a dyn Transport,
    deadline: Option<Instant>,
}

impl<'a> TagLister<'a> {
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

    /// Fetch every page of tags and return the acceptable candidate versions.
    ///
    /// Candidates keep registry order. Tags that are not versions, that have
    /// a different shape than `base`, or that the update-type filter rejects
    /// are dropped; duplicates collapse to their first occurrence.
    pub async fn list_tags(&self, query: &TagQuery<'_>) -> Result<Vec<Version>> {
        let base_url = registry_base(query.host, query.insecure);
        let max_pages = query.max_pages.max(1);

        let mut next = Some(format!("{}/v2/{}/tags/list", base_url, query.repository));
        let mut seen = HashSet::new();
        let mut versions = Vec::new();
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages >= max_pages {
                debug!(
                    "Stopping tag listing for {} after {} pages",
                    query.repository, pages
                );
                break;
            }

            debug!("Listing tags from: {}", url);
            let request = HttpRequest::new(url.as_str())
                .deadline(self.deadline)
                .bearer(query.token.map(BearerToken::as_str))?
                .header(ACCEPT, "application/json")?;

            let response = self.transport.get(request, false).await?;
            pages += 1;

            let page: TagsResponse = response.json()?;
            let tags = page.tags.unwrap_or_default();
            let accepted = filter_candidates(
                &tags,
                &query.base,
                query.ignore_update_type,
                &mut seen,
            );
            trace!(
                "Page {}: {} tags, {} accepted",
                pages,
                tags.len(),
                accepted.len()
            );
            versions.extend(accepted);

            next = next_page_url(&url, response.header("link"));
        }

        debug!(
            "Found {} candidate versions for {}",
            versions.len(),
            query.repository
        );
        Ok(versions)
    }
}

/// Parse, filter and deduplicate one page of tags.
///
/// `seen` carries the `(major, minor, patch)` keys already accepted during the
/// current listing.
pub fn filter_candidates(
    tags: &[String],
    base: &Version,
    ignore_update_type: UpdateType,
    seen: &mut HashSet<Version>,
) -> Vec<Version> {
    tags.iter()
        .filter_map(|tag| {
            let parsed = Version::parse(tag);
            if parsed.is_none() {
                trace!("Skipping non-version tag: {}", tag);
            }
            parsed
        })
        .filter(|v| v.same_shape(base))
        .filter(|v| ignore_update_type.permits(base, v))
        .filter(|v| seen.insert(*v))
        .collect()
}

/// Extract the target of the `rel="next"` entry of a `Link` header
pub fn parse_next_link(header: &str) -> Option<&str> {
    header
        .split(',')
        .map(str::trim)
        .find(|part| part.split(';').skip(1).any(is_next_relation))
        .and_then(|part| {
            let start = part.find('<')?;
            let end = part[start..].find('>')? + start;
            Some(&part[start + 1..end])
        })
}

/// Whether a link parameter is a `rel` whose relation types include `next`
fn is_next_relation(param: &str) -> bool {
    let Some((name, value)) = param.split_once('=') else {
        return false;
    };
    name.trim().eq_ignore_ascii_case("rel")
        && value
            .trim()
            .trim_matches('"')
            .split_whitespace()
            .any(|relation| relation.eq_ignore_ascii_case("next"))
}

/// Absolute URL of the next page, or `None` when listing is complete.
///
/// A next link whose `n` parameter is `0` marks the end of the results.
pub fn next_page_url(current: &str, link_header: Option<&str>) -> Option<String> {
    let link = parse_next_link(link_header?)?;
    let next = Url::parse(current).ok()?.join(link).ok()?;

    if next.query_pairs().any(|(key, value)| key == "n" && value == "0") {
        debug!("Next page link has n=0, treating as last page");
        return None;
    }

    Some(next.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_filter_discards_non_versions() {
        let base = Version::new(1, 0, 0);
        let mut seen = HashSet::new();
        let result = filter_candidates(
            &tags(&["latest", "1.1.0", "main", "sha-1234", "2.0.0"]),
            &base,
            UpdateType::None,
            &mut seen,
        );
        assert_eq!(result, vec![Version::new(1, 1, 0), Version::new(2, 0, 0)]);
    }

    #[test]
    fn test_filter_shape_major_only_base() {
        let base = Version::major_only(1);
        let mut seen = HashSet::new();
        let result = filter_candidates(
            &tags(&["1.2.3", "2", "1.2", "3"]),
            &base,
            UpdateType::None,
            &mut seen,
        );
        assert_eq!(result, vec![Version::major_only(2), Version::major_only(3)]);
    }

    #[test]
    fn test_filter_shape_full_base_rejects_partials() {
        let base = Version::new(4, 0, 0);
        let mut seen = HashSet::new();
        let result = filter_candidates(
            &tags(&["4", "4.1", "4.1.0"]),
            &base,
            UpdateType::None,
            &mut seen,
        );
        assert_eq!(result, vec![Version::new(4, 1, 0)]);
    }

    #[test]
    fn test_filter_update_type_minor() {
        let base = Version::new(1, 4, 2);
        let mut seen = HashSet::new();
        let result = filter_candidates(
            &tags(&["1.4.9", "1.5.0", "2.0.0", "1.4.0"]),
            &base,
            UpdateType::Minor,
            &mut seen,
        );
        assert_eq!(result, vec![Version::new(1, 4, 9), Version::new(1, 4, 0)]);
    }

    #[test]
    fn test_filter_deduplicates_suffixes_first_wins() {
        let base = Version::new(1, 0, 0);
        let mut seen = HashSet::new();
        let result = filter_candidates(
            &tags(&["1.2.0-alpine", "1.2.0", "v1.2.0", "1.3.0"]),
            &base,
            UpdateType::None,
            &mut seen,
        );
        assert_eq!(result, vec![Version::new(1, 2, 0), Version::new(1, 3, 0)]);
    }

    #[test]
    fn test_dedup_is_idempotent_across_pages() {
        let base = Version::new(1, 0, 0);
        let page = tags(&["1.0.0", "1.1.0", "1.1.0-rc1", "2.0.0"]);

        let mut once_seen = HashSet::new();
        let once = filter_candidates(&page, &base, UpdateType::None, &mut once_seen);

        let mut twice_seen = HashSet::new();
        let mut twice = filter_candidates(&page, &base, UpdateType::None, &mut twice_seen);
        twice.extend(filter_candidates(&page, &base, UpdateType::None, &mut twice_seen));

        assert_eq!(once, twice);
        assert_eq!(once_seen, twice_seen);
    }

    #[test]
    fn test_parse_next_link() {
        assert_eq!(
            parse_next_link(r#"</v2/owner/repo/tags/list?last=1.2.0&n=100>; rel="next""#),
            Some("/v2/owner/repo/tags/list?last=1.2.0&n=100")
        );
        assert_eq!(
            parse_next_link(r#"<https://a.example/prev>; rel="prev", <https://a.example/next>; rel="next""#),
            Some("https://a.example/next")
        );
        assert_eq!(parse_next_link(r#"</v2/x>; rel="prev""#), None);
        assert_eq!(parse_next_link(""), None);
    }

    #[test]
    fn test_parse_next_link_relation_forms() {
        assert_eq!(parse_next_link(r#"</v2/a>; REL="next""#), Some("/v2/a"));
        assert_eq!(parse_next_link(r#"</v2/b>; rel=next"#), Some("/v2/b"));
        assert_eq!(parse_next_link(r#"</v2/c>; rel="next prev""#), Some("/v2/c"));
        assert_eq!(parse_next_link(r#"</v2/d>; Rel = "Next""#), Some("/v2/d"));
        assert_eq!(parse_next_link(r#"</v2/e>; rel="nextpage""#), None);
        assert_eq!(parse_next_link(r#"</v2/f>; title="next""#), None);
    }

    #[test]
    fn test_next_page_url_resolves_relative() {
        let next = next_page_url(
            "https://ghcr.io/v2/owner/repo/tags/list",
            Some(r#"</v2/owner/repo/tags/list?last=b&n=50>; rel="next""#),
        );
        assert_eq!(
            next.as_deref(),
            Some("https://ghcr.io/v2/owner/repo/tags/list?last=b&n=50")
        );
    }

    #[test]
    fn test_next_page_url_zero_sentinel() {
        assert_eq!(
            next_page_url(
                "https://ghcr.io/v2/owner/repo/tags/list",
                Some(r#"</v2/owner/repo/tags/list?last=b&n=0>; rel="next""#),
            ),
            None
        );
        // n=10 is not the sentinel
        assert!(next_page_url(
            "https://ghcr.io/v2/owner/repo/tags/list",
            Some(r#"</v2/owner/repo/tags/list?n=10>; rel="next""#),
        )
        .is_some());
    }

    #[test]
    fn test_next_page_url_without_link() {
        assert_eq!(next_page_url("https://ghcr.io/v2/x/tags/list", None), None);
    }
}
