//! query_schema: static partial GraphQL schema

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ToolError, ToolOutput, ToolTrait};

pub const NAME: &str = "query_schema";
pub const DESCRIPTION: &str = "Returns a partial GraphQL Schema that can be used to construct queries and mutations for an API that supports searching for managed assets and returning details regarding their operating systems, hardware and more.";

/// Asset API schema bundled at build time
pub const ASSETS_SCHEMA: &str = include_str!("../../assets/assets_schema.graphql");

pub struct QuerySchemaTool;

#[async_trait]
impl ToolTrait for QuerySchemaTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::json(json!({ "schema": ASSETS_SCHEMA.trim() })))
    }
}
