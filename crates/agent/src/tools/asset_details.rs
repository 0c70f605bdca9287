//! asset_details: fixed detail query for one asset

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{required_str, GraphQlClient, ToolError, ToolOutput, ToolTrait};

pub const NAME: &str = "asset_details";
pub const DESCRIPTION: &str = "Provides the details of an asset e.g. name, owner, operating system, hardware details, etc";

/// Detail query, `$id` bound to the requested asset
pub const ASSET_DETAILS_QUERY: &str = include_str!("../../assets/asset_details.graphql");

pub struct AssetDetailsTool {
    client: GraphQlClient,
}

impl AssetDetailsTool {
    pub fn new(client: GraphQlClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolTrait for AssetDetailsTool {
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
                "assetId": {
                    "type": "string",
                    "description": "User provided identifier for the asset."
                }
            },
            "required": ["assetId"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let asset_id = required_str(&args, "assetId")?;
        debug!("fetching details for asset {}", asset_id);

        let variables = json!({ "id": asset_id });
        let raw = self
            .client
            .execute(ASSET_DETAILS_QUERY, Some(&variables))
            .await?;
        Ok(ToolOutput::json(json!({ "asset": raw })))
    }
}
