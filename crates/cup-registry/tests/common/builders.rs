//! Checker and request builders pointed at a mock registry

use super::constants::*;
use cup_core::{CupConfig, RegistryConfig, SelectionPolicy};
use cup_registry::{CheckRequest, UpdateChecker};
use wiremock::MockServer;

/// `host:port` of the mock registry
pub fn registry_host(server: &MockServer) -> String {
    server.address().to_string()
}

/// Config that reaches the mock registry over plain HTTP
pub fn test_config(server: &MockServer, policy: SelectionPolicy) -> CupConfig {
    CupConfig {
        registries: vec![RegistryConfig::new(registry_host(server)).insecure(true)],
        selection_policy: policy,
        ..Default::default()
    }
}

pub fn test_checker(server: &MockServer, policy: SelectionPolicy) -> UpdateChecker {
    UpdateChecker::new(test_config(server, policy)).expect("checker should build")
}

/// Request for `owner/app:{tag}` on the mock registry
pub fn test_request(server: &MockServer, tag: &str) -> CheckRequest {
    CheckRequest::new(registry_host(server), OWNER, REPO, tag)
}
