//! Mock server helpers for registry endpoints
//!
//! Provides wiremock setups for the distribution API routes a check touches:
//! the `/v2/` probe, the token realm, tag listing and manifest HEADs.

use super::constants::*;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn tags_path(repository: &str) -> String {
    format!("/v2/{}/tags/list", repository)
}

/// `/v2/` answers 200, no auth required
pub async fn mock_anonymous_probe(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v2/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// `/v2/` answers 401 with the given `WWW-Authenticate` value
pub async fn mock_challenge(server: &MockServer, www_authenticate: &str) {
    Mock::given(method("GET"))
        .and(path("/v2/"))
        .respond_with(ResponseTemplate::new(401).insert_header("www-authenticate", www_authenticate))
        .mount(server)
        .await;
}

/// `/v2/` answers 401 with a Bearer challenge whose realm is `/token` on this server
pub async fn mock_bearer_challenge(server: &MockServer) {
    let challenge = format!(
        r#"Bearer realm="{}/token",service="{}""#,
        server.uri(),
        SERVICE
    );
    mock_challenge(server, &challenge).await;
}

/// `/token` issues `token` to any caller
pub async fn mock_token(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
        .mount(server)
        .await;
}

/// Single page of tags
pub async fn mock_tags(server: &MockServer, repository: &str, tags: &[&str]) {
    Mock::given(method("GET"))
        .and(path(tags_path(repository)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tags": tags })))
        .mount(server)
        .await;
}

/// Single page of tags that requires `Authorization: Bearer {token}`
pub async fn mock_tags_with_token(server: &MockServer, repository: &str, tags: &[&str], token: &str) {
    Mock::given(method("GET"))
        .and(path(tags_path(repository)))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tags": tags })))
        .mount(server)
        .await;
}

/// Page of tags served for `?last={last}`, linking to `next` when given.
///
/// Pages with a `last` value take priority over the first page, which
/// matches any query. The caller mounts the mock, adding expectations first.
pub fn tags_page(repository: &str, tags: &[&str], last: Option<&str>, next: Option<&str>) -> Mock {
    let mut response = ResponseTemplate::new(200).set_body_json(json!({ "tags": tags }));
    if let Some(next) = next {
        response = response.insert_header("link", format!(r#"<{}>; rel="next""#, next).as_str());
    }

    let mut builder = Mock::given(method("GET")).and(path(tags_path(repository)));
    let priority = match last {
        Some(last) => {
            builder = builder.and(query_param("last", last));
            1
        }
        None => 5,
    };

    builder.respond_with(response).with_priority(priority)
}

/// Manifest HEAD answering with `docker-content-digest: {digest}`
pub async fn mock_manifest_digest(server: &MockServer, repository: &str, tag: &str, digest: &str) {
    Mock::given(method("HEAD"))
        .and(path(format!("/v2/{}/manifests/{}", repository, tag)))
        .respond_with(ResponseTemplate::new(200).insert_header("docker-content-digest", digest))
        .mount(server)
        .await;
}
