//! Tests for Config serialization, deserialization, and core functionality

use assetline_config::{AgentConfig, Config, GraphQlConfig, ModelConfig};
use tempfile::TempDir;

/// Helper to create a temporary directory for tests
fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Test that default Config has expected values
#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert!(config.model.api_key.is_empty());
    assert!(config.model.api_base.is_none());
    assert_eq!(config.model.model, "anthropic/claude-3-haiku");
    assert_eq!(config.model.max_tokens, 4096);
    assert_eq!(config.model.temperature, 0.0);

    assert_eq!(config.graphql.endpoint, "https://stg.api.n-able.com/graphql");
    assert!(config.graphql.token.is_empty());
    assert_eq!(config.graphql.timeout_secs, 10);

    assert_eq!(config.agent.max_tool_rounds, 20);
    assert_eq!(config.agent.stream_buffer, 32);
    assert!(config.agent.system_prompt.is_none());
}

/// Test that an empty JSON object yields defaults in every section
#[test]
fn test_deserialize_empty_object() {
    let config: Config = serde_json::from_str("{}").expect("Failed to parse");
    assert_eq!(config.agent.max_tool_rounds, 20);
    assert_eq!(config.graphql.timeout_secs, 10);
    assert_eq!(config.model.model, "anthropic/claude-3-haiku");
}

/// Test partial sections keep defaults for missing fields
#[test]
fn test_deserialize_partial_sections() {
    let json = r#"{
        "model": { "api_key": "sk-test" },
        "graphql": { "endpoint": "http://localhost:4000/graphql" },
        "agent": { "max_tool_rounds": 5 }
    }"#;
    let config: Config = serde_json::from_str(json).expect("Failed to parse");

    assert_eq!(config.model.api_key, "sk-test");
    assert_eq!(config.model.max_tokens, 4096);
    assert_eq!(config.graphql.endpoint, "http://localhost:4000/graphql");
    assert_eq!(config.graphql.timeout_secs, 10);
    assert_eq!(config.agent.max_tool_rounds, 5);
    assert_eq!(config.agent.stream_buffer, 32);
}

/// Test a zero round limit still allows one model call
#[test]
fn test_zero_max_tool_rounds_allows_one_call() {
    let json = r#"{ "agent": { "max_tool_rounds": 0 } }"#;
    let config: Config = serde_json::from_str(json).expect("Failed to parse");

    assert_eq!(config.agent.max_tool_rounds, 0);
    assert_eq!(config.max_tool_rounds(), 1);
    assert_eq!(Config::default().max_tool_rounds(), 20);
}

/// Test unset optional fields are omitted on serialization
#[test]
fn test_serialize_skips_unset_options() {
    let json = serde_json::to_string(&Config::default()).expect("Failed to serialize");
    assert!(!json.contains("api_base"));
    assert!(!json.contains("system_prompt"));
}

/// Test save_to then load_from keeps custom values
#[tokio::test]
async fn test_save_and_load() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");

    let config = Config {
        model: ModelConfig {
            api_key: "sk-saved".to_string(),
            api_base: Some("http://localhost:8080/v1".to_string()),
            model: "custom/model".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
        },
        graphql: GraphQlConfig {
            endpoint: "http://localhost:4000/graphql".to_string(),
            token: "gql-token".to_string(),
            timeout_secs: 3,
        },
        agent: AgentConfig {
            max_tool_rounds: 7,
            stream_buffer: 8,
            system_prompt: Some("Be brief.".to_string()),
        },
    };

    config.save_to(&path).await.expect("Failed to save");
    let loaded = Config::load_from(&path).await.expect("Failed to load");

    assert_eq!(loaded.model.api_key, "sk-saved");
    assert_eq!(loaded.model.model, "custom/model");
    assert_eq!(loaded.graphql.token, "gql-token");
    assert_eq!(loaded.graphql.timeout_secs, 3);
    assert_eq!(loaded.agent.max_tool_rounds, 7);
    assert_eq!(loaded.agent.system_prompt.as_deref(), Some("Be brief."));
}

/// Test save_to creates missing parent directories
#[tokio::test]
async fn test_save_creates_parent_dirs() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("deeper").join("config.json");

    Config::default().save_to(&path).await.expect("Failed to save");
    assert!(path.exists());
}

/// Test load_from returns defaults when the file is missing
#[tokio::test]
async fn test_load_missing_file_returns_default() {
    let dir = temp_dir();
    let path = dir.path().join("absent.json");

    let config = Config::load_from(&path).await.expect("Failed to load");
    assert_eq!(config.agent.max_tool_rounds, 20);
}

/// Test load_from surfaces malformed JSON as an error
#[tokio::test]
async fn test_load_invalid_json() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();

    let result = Config::load_from(&path).await;
    assert!(matches!(result, Err(assetline_config::ConfigError::Json(_))));
}

/// Test accessors
#[test]
fn test_accessors() {
    let mut config = Config::default();
    config.model.model = "other/model".to_string();
    config.agent.max_tool_rounds = 3;

    assert_eq!(config.default_model(), "other/model");
    assert_eq!(config.max_tool_rounds(), 3);
}
