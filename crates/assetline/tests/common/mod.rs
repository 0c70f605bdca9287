//! Common test utilities for Assetline integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Create a test environment with an isolated home directory
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnv {
    /// Create a new test environment
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_dir = temp_dir.path().join(".assetline");

        Ok(Self {
            temp_dir,
            config_dir,
        })
    }

    /// Get the path to a file in the config directory
    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }

    /// Create a command rooted in the test home with no credentials in the environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_assetline"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env_remove("ASSETLINE_API_KEY");
        cmd.env_remove("ASSETLINE_GRAPHQL_TOKEN");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Write a config whose model and GraphQL endpoints point at `base_url`
    pub fn create_config(&self, base_url: &str) -> anyhow::Result<()> {
        let config = serde_json::json!({
            "model": {
                "api_key": "test-api-key",
                "api_base": base_url,
                "model": "test/model"
            },
            "graphql": {
                "endpoint": format!("{}/graphql", base_url),
                "token": "test-token",
                "timeout_secs": 5
            },
            "agent": {
                "max_tool_rounds": 4
            }
        });
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::write(
            self.config_file("config.json"),
            serde_json::to_string_pretty(&config)?,
        )?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
