//! Tools offered to the model

pub mod asset_details;
pub mod execute_query;
pub mod graphql;
pub mod knowledge;
pub mod schema;
pub mod user_input;

pub use asset_details::AssetDetailsTool;
pub use execute_query::ExecuteQueryTool;
pub use graphql::GraphQlClient;
pub use knowledge::KnowledgeQueryTool;
pub use schema::QuerySchemaTool;
pub use user_input::UserInputTool;

use std::collections::HashMap;
use std::sync::Arc;

use assetline_provider::{ToolResultContent, ToolSpec};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::publisher::TaskPublisher;
use crate::{AgentError, ErrorKind};

/// Tool invocation errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("could not record task state: {0}")]
    PublishFailure(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::MissingParameter(_) => ErrorKind::MissingParameter,
            ToolError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            ToolError::Upstream(_) => ErrorKind::UpstreamFailure,
            ToolError::PublishFailure(_) => ErrorKind::PublishFailure,
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::Upstream(err.to_string())
    }
}

/// Content returned by a tool, sent back to the model as a tool result
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: Vec<ToolResultContent>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text: text.into() }],
        }
    }

    pub fn json(json: Value) -> Self {
        Self {
            content: vec![ToolResultContent::Json { json }],
        }
    }
}

/// A capability the model can invoke
#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the input object
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError>;
}

type BoxedTool = Box<dyn ToolTrait>;

pub fn to_tool_spec(tool: &dyn ToolTrait) -> ToolSpec {
    ToolSpec::new(tool.name(), tool.description(), tool.parameters())
}

/// Read a required, non-empty string parameter
pub(crate) fn required_str(args: &Value, name: &str) -> Result<String, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Err(ToolError::MissingParameter(name.to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ToolError::MissingParameter(name.to_string()))
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ToolError::InvalidParameter {
            name: name.to_string(),
            reason: format!("expected a string, got {}", other),
        }),
    }
}

/// Tools available for one turn, in registration order
pub struct ToolRegistry {
    tools: HashMap<String, BoxedTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Add a tool; a later registration under the same name replaces the earlier one
    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), Box::new(tool)).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolTrait> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Schemas to present to the model
    pub fn schemas_for_model(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| to_tool_spec(t.as_ref()))
            .collect()
    }

    /// Run the named tool
    pub async fn dispatch(&self, name: &str, args: Value) -> crate::Result<ToolOutput> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        debug!("dispatching tool {}", name);
        tool.execute(args).await.map_err(|source| AgentError::Tool {
            tool: name.to_string(),
            source,
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Name and description of every tool the agent offers
pub fn catalog() -> Vec<(&'static str, &'static str)> {
    vec![
        (schema::NAME, schema::DESCRIPTION),
        (execute_query::NAME, execute_query::DESCRIPTION),
        (knowledge::NAME, knowledge::DESCRIPTION),
        (asset_details::NAME, asset_details::DESCRIPTION),
        (user_input::NAME, user_input::DESCRIPTION),
    ]
}

/// Build the registry for one turn
pub fn turn_registry(graphql: GraphQlClient, publisher: Arc<TaskPublisher>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(QuerySchemaTool);
    registry.register(ExecuteQueryTool::new(graphql.clone()));
    registry.register(KnowledgeQueryTool);
    registry.register(AssetDetailsTool::new(graphql));
    registry.register(UserInputTool::new(publisher));
    registry
}
