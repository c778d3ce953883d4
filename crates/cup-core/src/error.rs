//! Error types for cup-core

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Result type alias using cup-core's configuration Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and input errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown update type name
    #[error("Unknown update type: {value}. Valid update types: none, major, minor, patch")]
    InvalidUpdateType { value: String },

    /// Unknown selection policy name
    #[error("Unknown selection policy: {value}. Valid policies: newest, first-listed")]
    InvalidSelectionPolicy { value: String },

    /// Malformed image reference
    #[error("Invalid image reference: {reference}")]
    InvalidReference { reference: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid update type error
    pub fn invalid_update_type(value: impl Into<String>) -> Self {
        Self::InvalidUpdateType {
            value: value.into(),
        }
    }

    /// Create an invalid selection policy error
    pub fn invalid_selection_policy(value: impl Into<String>) -> Self {
        Self::InvalidSelectionPolicy {
            value: value.into(),
        }
    }

    /// Create an invalid reference error
    pub fn invalid_reference(reference: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
        }
    }
}

/// Failure of a single image check.
///
/// Attached to `ImageResult::error`; never shared between checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// Registry answered 404
    #[error("{method} {url}: not found")]
    NotFound { method: &'static str, url: String },

    /// Registry answered 401 on a request that required access
    #[error("{method} {url}: unauthorized")]
    Unauthorized { method: &'static str, url: String },

    /// Registry answered 502
    #[error("{method} {url}: registry unavailable")]
    RegistryUnavailable { method: &'static str, url: String },

    /// Any other status >= 400
    #[error("{method} {url}: request failed with status {status}")]
    RequestFailed {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// `WWW-Authenticate` challenge with a scheme other than Bearer
    #[error("unsupported authentication scheme: {scheme:?}")]
    UnsupportedAuthScheme { scheme: String },

    /// Bearer challenge without a `realm` attribute
    #[error("realm not found in www-authenticate header")]
    MissingRealm,

    /// Token could not be obtained from the auth realm
    #[error("token exchange failed: {cause}")]
    TokenExchangeFailed { cause: Box<CheckError> },

    /// No candidate tag survived filtering
    #[error("no newer tag found")]
    NoNewerTag,

    /// Network failure, malformed URL or expired deadline
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The current tag is not a version
    #[error("invalid version tag: {tag}")]
    InvalidTag { tag: String },

    /// The registry answered with a body that could not be decoded
    #[error("invalid registry response: {message}")]
    InvalidResponse { message: String },
}

impl CheckError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Wrap a failure as a token exchange failure
    pub fn token_exchange(cause: CheckError) -> Self {
        Self::TokenExchangeFailed {
            cause: Box::new(cause),
        }
    }

    /// HTTP status carried by this error, if it came from a status mapping
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Unauthorized { .. } => Some(401),
            Self::RegistryUnavailable { .. } => Some(502),
            Self::RequestFailed { status, .. } => Some(*status),
            Self::TokenExchangeFailed { cause } => cause.status(),
            _ => None,
        }
    }

    /// Whether the failure happened while negotiating access
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::UnsupportedAuthScheme { .. }
                | Self::MissingRealm
                | Self::TokenExchangeFailed { .. }
        )
    }
}

impl Serialize for CheckError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
