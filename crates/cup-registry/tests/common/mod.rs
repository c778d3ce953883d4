//! Common test infrastructure for cup-registry tests
//!
//! # Usage
//!
//! In your test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `constants`: Repository names, digests, tokens
//! - `builders`: Checker and request construction against a mock registry
//! - `mock_server`: Wiremock setup helpers for registry endpoints

// Not every test file uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod constants;
pub mod mock_server;

pub use builders::*;
pub use constants::*;
pub use mock_server::*;
