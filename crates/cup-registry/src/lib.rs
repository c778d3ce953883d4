//! Registry v2 client for cup
//!
//! This crate answers "is there a newer version of this image?" against any
//! registry implementing the Docker/OCI distribution API:
//! - Auth negotiation (anonymous or bearer tokens from a challenge realm)
//! - Paginated tag listing with version filtering
//! - Manifest digest lookups for rebuilt tags
//! - Update resolution over one image or a batch
//!
//! # Example
//!
//! ```no_run
//! use cup_core::CupConfig;
//! use cup_registry::{CheckRequest, UpdateChecker};
//!
//! # async fn example() -> Result<(), cup_core::CheckError> {
//! let checker = UpdateChecker::new(CupConfig::default())?;
//! let request = CheckRequest::new("ghcr.io", "steveiliop56", "tinyauth", "v4.0.0")
//!     .local_digests(["sha256:aaa"]);
//!
//! let result = checker.check(request).await;
//! println!("{}: {}", result.reference, result.status());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod checker;
pub mod digest;
pub mod tags;
pub mod transport;

pub use auth::{parse_www_authenticate, AuthChallenge, AuthNegotiator, BearerToken};
pub use checker::{select_latest, CheckRequest, Selection, UpdateChecker};
pub use digest::DigestChecker;
pub use tags::{TagLister, TagQuery};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
