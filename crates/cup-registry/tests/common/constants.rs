//! Shared constants for test infrastructure

// Repository under test
pub const OWNER: &str = "owner";
pub const REPO: &str = "app";
pub const REPOSITORY: &str = "owner/app";

// Digests
pub const DIGEST_AAA: &str = "sha256:aaa";
pub const DIGEST_BBB: &str = "sha256:bbb";

// Credentials ("user:pass" in base64)
pub const USERNAME: &str = "user";
pub const PASSWORD: &str = "pass";
pub const BASIC_USER_PASS: &str = "Basic dXNlcjpwYXNz";

pub const TOKEN: &str = "registry-token-123";
pub const SERVICE: &str = "registry.test";
