//! Registry authentication negotiation
//!
//! Registries advertise their token service through a `WWW-Authenticate`
//! challenge on `GET /v2/`. When one is present, a bearer token scoped to the
//! repositories being checked is fetched from the challenge realm, optionally
//! presenting HTTP Basic credentials.

use crate::transport::{registry_base, HttpRequest, Result, Transport};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cup_core::CheckError;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::fmt;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Parsed `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    /// Token endpoint URL
    pub realm: String,
    /// Service name to forward to the token endpoint
    pub service: Option<String>,
}

/// Short-lived bearer token. Its value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken(<{} chars>)", self.0.len())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Parse a `WWW-Authenticate` header value.
///
/// Only the Bearer scheme is supported; the challenge must carry a `realm`.
pub fn parse_www_authenticate(header: &str) -> Result<AuthChallenge> {
    let header = header.trim();
    let (scheme, params) = header.split_once(char::is_whitespace).unwrap_or((header, ""));

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(CheckError::UnsupportedAuthScheme {
            scheme: scheme.to_string(),
        });
    }

    let attributes = parse_attributes(params);
    let find = |name: &str| {
        attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    };

    let realm = find("realm")
        .filter(|r| !r.is_empty())
        .ok_or(CheckError::MissingRealm)?;

    Ok(AuthChallenge {
        realm,
        service: find("service").filter(|s| !s.is_empty()),
    })
}

/// Split `key="value",key2=value2` into pairs, honoring quotes and `\` escapes
fn parse_attributes(params: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    let mut chars = params.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

        let key: String = std::iter::from_fn(|| chars.next_if(|c| *c != '=' && *c != ',')).collect();
        if key.trim().is_empty() {
            if chars.peek().is_none() {
                break;
            }
            chars.next();
            continue;
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => value.extend(chars.next()),
                    '"' => break,
                    c => value.push(c),
                }
            }
        } else {
            value.extend(std::iter::from_fn(|| chars.next_if(|c| *c != ',')));
            value = value.trim().to_string();
        }

        attributes.push((key.trim().to_string(), value));
    }

    attributes
}

/// Probes registries for auth challenges and exchanges them for tokens
pub struct AuthNegotiator<'a> {
    transport: &'a dyn Transport,
    deadline: Option<Instant>,
}

impl<'a> AuthNegotiator<'a> {
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

    /// Ask the registry whether anonymous access is allowed.
    ///
    /// Returns the challenge when `GET /v2/` answers 401. Any other status
    /// means no token is needed; network failures are returned as errors.
    pub async fn probe(&self, host: &str, insecure: bool) -> Result<Option<AuthChallenge>> {
        let url = format!("{}/v2/", registry_base(host, insecure));
        debug!("Probing registry auth at {}", url);

        let request = HttpRequest::new(url).deadline(self.deadline);
        match self.transport.get(request, true).await {
            Ok(response) if response.status == 401 => {
                let header = response.header("www-authenticate").unwrap_or_default();
                let challenge = parse_www_authenticate(header)?;
                debug!(
                    "Auth challenge from {}: realm={}, service={:?}",
                    host, challenge.realm, challenge.service
                );
                Ok(Some(challenge))
            }
            Ok(_) => Ok(None),
            Err(err @ CheckError::Transport { .. }) => Err(err),
            Err(err) => {
                debug!(
                    "Probe of {} answered {:?} ({}), assuming anonymous access",
                    host,
                    err.status(),
                    err
                );
                Ok(None)
            }
        }
    }

    /// Obtain a pull token for `repositories` from the challenge realm.
    ///
    /// One `scope=repository:{repo}:pull` parameter is sent per repository.
    /// Every failure is reported as [`CheckError::TokenExchangeFailed`].
    pub async fn exchange(
        &self,
        challenge: &AuthChallenge,
        repositories: &[&str],
        credentials: Option<(&str, &str)>,
    ) -> Result<BearerToken> {
        let mut url = Url::parse(&challenge.realm).map_err(|e| {
            CheckError::token_exchange(CheckError::transport(format!(
                "invalid realm URL {}: {}",
                challenge.realm, e
            )))
        })?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &challenge.service {
                query.append_pair("service", service);
            }
            for repository in repositories {
                query.append_pair("scope", &format!("repository:{}:pull", repository));
            }
        }

        debug!("Requesting token from: {}", url);

        let mut request = HttpRequest::new(url.as_str())
            .deadline(self.deadline)
            .header(ACCEPT, "application/json")
            .map_err(CheckError::token_exchange)?;
        if let Some((username, password)) = credentials {
            debug!("Using Basic credentials for user {}", username);
            let encoded = STANDARD.encode(format!("{}:{}", username, password));
            request = request
                .header(AUTHORIZATION, &format!("Basic {}", encoded))
                .map_err(CheckError::token_exchange)?;
        }

        let response = self
            .transport
            .get(request, false)
            .await
            .map_err(CheckError::token_exchange)?;

        let body: TokenResponse = response.json().map_err(CheckError::token_exchange)?;
        let token = body
            .token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                CheckError::token_exchange(CheckError::invalid_response(
                    "token response contains no token",
                ))
            })?;

        debug!("Token obtained (length: {} chars)", token.len());
        Ok(BearerToken::new(token))
    }
}
