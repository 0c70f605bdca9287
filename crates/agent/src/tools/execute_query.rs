//! execute_query: GraphQL passthrough

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{required_str, GraphQlClient, ToolError, ToolOutput, ToolTrait};

pub const NAME: &str = "execute_query";
pub const DESCRIPTION: &str = "Executes a GraphQL Query using the n-able public API. Provides support for sophisticated searching of assets.";

pub struct ExecuteQueryTool {
    client: GraphQlClient,
}

impl ExecuteQueryTool {
    pub fn new(client: GraphQlClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolTrait for ExecuteQueryTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "A GraphQL Query that will be executed to search for managed assets and return their details."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = required_str(&args, "query")?;
        debug!("executing asset query ({} chars)", query.len());

        let raw = self.client.execute(&query, None).await?;
        Ok(ToolOutput::json(json!({ "assets": raw })))
    }
}
