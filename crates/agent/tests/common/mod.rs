//! Common test utilities for agent integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetline_agent::{AgentLoop, AgentSettings, GraphQlClient};
use assetline_provider::{
    ConverseOutput, ConverseRequest, Provider, ProviderError, ToolUse,
};
use assetline_task::{InMemoryTaskStore, TaskStore};
use async_trait::async_trait;
use serde_json::Value;

/// Provider that replays queued responses and records every request
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ConverseOutput, ProviderError>>>,
    requests: Arc<Mutex<Vec<ConverseRequest>>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<ConverseOutput>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub fn with_results(responses: Vec<Result<ConverseOutput, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Wait this long before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared view of the requests seen so far
    pub fn requests(&self) -> Arc<Mutex<Vec<ConverseRequest>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl Provider for ScriptedModel {
    async fn converse(&self, request: ConverseRequest) -> Result<ConverseOutput, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::InvalidResponse))
    }

    fn default_model(&self) -> String {
        "scripted/model".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }
}

pub fn tool_use(id: &str, name: &str, input: Value) -> ToolUse {
    ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}

/// Agent backed by an in-memory store and a GraphQL client aimed at `graphql_url`
pub fn agent_with(
    model: ScriptedModel,
    graphql_url: &str,
    settings: AgentSettings,
) -> (AgentLoop<ScriptedModel>, Arc<InMemoryTaskStore>) {
    let store = Arc::new(InMemoryTaskStore::new());
    let dyn_store: Arc<dyn TaskStore> = store.clone();
    let graphql = GraphQlClient::new(
        format!("{}/graphql", graphql_url.trim_end_matches('/')),
        "test-token",
        Duration::from_secs(5),
    );
    (AgentLoop::new(model, dyn_store, graphql, settings), store)
}

/// Agent whose GraphQL endpoint is never expected to be called
pub fn agent(model: ScriptedModel) -> (AgentLoop<ScriptedModel>, Arc<InMemoryTaskStore>) {
    agent_with(model, "http://127.0.0.1:1", AgentSettings::default())
}
