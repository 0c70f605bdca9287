//! Tests for credential lookup and environment fallbacks

use assetline_config::{Config, API_KEY_ENV, GRAPHQL_TOKEN_ENV};
use serial_test::serial;

/// Test api_key is None when neither config nor env provide one
#[test]
#[serial]
fn test_api_key_none_when_empty() {
    std::env::remove_var(API_KEY_ENV);
    let config = Config::default();
    assert_eq!(config.api_key(), None);
    assert!(!config.has_api_key());
}

/// Test the configured key wins over the environment
#[test]
#[serial]
fn test_api_key_prefers_config() {
    std::env::set_var(API_KEY_ENV, "env-key");
    let mut config = Config::default();
    config.model.api_key = "config-key".to_string();

    assert_eq!(config.api_key(), Some("config-key".to_string()));
    std::env::remove_var(API_KEY_ENV);
}

/// Test the environment fallback for the model key
#[test]
#[serial]
fn test_api_key_env_fallback() {
    std::env::set_var(API_KEY_ENV, "env-key");
    let config = Config::default();

    assert_eq!(config.api_key(), Some("env-key".to_string()));
    assert!(config.has_api_key());
    std::env::remove_var(API_KEY_ENV);
}

/// Test an empty env var counts as unset
#[test]
#[serial]
fn test_api_key_empty_env_ignored() {
    std::env::set_var(API_KEY_ENV, "");
    let config = Config::default();

    assert_eq!(config.api_key(), None);
    std::env::remove_var(API_KEY_ENV);
}

/// Test GraphQL token lookup
#[test]
#[serial]
fn test_graphql_token_lookup() {
    std::env::remove_var(GRAPHQL_TOKEN_ENV);
    let mut config = Config::default();
    assert_eq!(config.graphql_token(), None);

    std::env::set_var(GRAPHQL_TOKEN_ENV, "env-token");
    assert_eq!(config.graphql_token(), Some("env-token".to_string()));

    config.graphql.token = "config-token".to_string();
    assert_eq!(config.graphql_token(), Some("config-token".to_string()));
    std::env::remove_var(GRAPHQL_TOKEN_ENV);
}
