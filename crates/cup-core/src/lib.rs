//! # cup-core
//!
//! Core library for cup providing:
//! - Image reference and check result types
//! - Lenient version parsing for image tags
//! - Update-type filtering and latest-tag selection policies
//! - Configuration loading (YAML file + environment overrides)
//! - The per-image error taxonomy

pub mod config;
pub mod error;
pub mod types;
pub mod version;

pub use config::ConfigLoader;
pub use error::{CheckError, Error, Result};
pub use types::{
    CupConfig, DigestInfo, ImageReference, ImageResult, RegistryConfig, SelectionPolicy,
    UpdateKind, UpdateStatus, UpdateType, VersionInfo,
};
pub use version::Version;
