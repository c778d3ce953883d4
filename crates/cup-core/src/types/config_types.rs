//! Configuration types for registry access and check behavior

use crate::types::SelectionPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Complete cup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CupConfig {
    /// Per-registry settings, matched by host
    #[serde(default)]
    pub registries: Vec<RegistryConfig>,

    /// Maximum number of tag-list pages fetched per check
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Per-request timeout in seconds (0 disables it)
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// How the latest tag is chosen
    #[serde(default)]
    pub selection_policy: SelectionPolicy,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CupConfig {
    fn default() -> Self {
        Self {
            registries: Vec::new(),
            max_pages: default_max_pages(),
            http_timeout_secs: default_http_timeout(),
            selection_policy: SelectionPolicy::default(),
            user_agent: default_user_agent(),
        }
    }
}

impl CupConfig {
    /// Settings for `host`, falling back to secure anonymous access
    pub fn registry(&self, host: &str) -> RegistryConfig {
        self.registries
            .iter()
            .find(|r| r.host == host)
            .cloned()
            .unwrap_or_else(|| RegistryConfig::new(host))
    }

    /// Per-request timeout, `None` when disabled
    pub fn http_timeout(&self) -> Option<Duration> {
        (self.http_timeout_secs > 0).then(|| Duration::from_secs(self.http_timeout_secs))
    }
}

fn default_max_pages() -> usize {
    10
}
fn default_http_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!(
        "cup/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Access settings for one registry host
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Registry host, optionally with port (e.g., "ghcr.io", "localhost:5000")
    pub host: String,

    /// Use plain HTTP instead of HTTPS
    #[serde(default)]
    pub insecure: bool,

    /// Username for the token exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password or access token for the token exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Pre-issued bearer token; skips the auth probe entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl RegistryConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            insecure: false,
            username: None,
            password: None,
            token: None,
        }
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Username and password, only when both are set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("host", &self.host)
            .field("insecure", &self.insecure)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CupConfig::default();
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.selection_policy, SelectionPolicy::Newest);
        assert!(config.user_agent.starts_with("cup/"));
    }

    #[test]
    fn test_registry_lookup_falls_back() {
        let config = CupConfig {
            registries: vec![RegistryConfig::new("localhost:5000").insecure(true)],
            ..Default::default()
        };

        assert!(config.registry("localhost:5000").insecure);
        let fallback = config.registry("ghcr.io");
        assert_eq!(fallback, RegistryConfig::new("ghcr.io"));
        assert!(!fallback.insecure);
    }

    #[test]
    fn test_credentials_require_both_parts() {
        assert_eq!(RegistryConfig::new("ghcr.io").credentials(), None);

        let mut partial = RegistryConfig::new("ghcr.io");
        partial.username = Some("user".to_string());
        assert_eq!(partial.credentials(), None);

        let full = RegistryConfig::new("ghcr.io").with_credentials("user", "pass");
        assert_eq!(full.credentials(), Some(("user", "pass")));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = CupConfig {
            http_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.http_timeout(), None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = RegistryConfig::new("ghcr.io")
            .with_credentials("octocat", "hunter2")
            .with_token("static-token");
        let debug = format!("{:?}", config);
        assert!(debug.contains("octocat"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("static-token"));
    }
}
