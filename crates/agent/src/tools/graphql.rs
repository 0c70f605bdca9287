//! GraphQL upstream client

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::ToolError;

#[derive(Serialize)]
struct GraphQlBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Value>,
}

/// Posts queries to the asset API with a bearer token
#[derive(Clone)]
pub struct GraphQlClient {
    client: Client,
    endpoint: String,
    token: String,
    timeout: Duration,
}

impl GraphQlClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute a query and return the raw response body
    pub async fn execute(
        &self,
        query: &str,
        variables: Option<&Value>,
    ) -> Result<String, ToolError> {
        debug!("graphql request to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&GraphQlBody { query, variables })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("graphql endpoint returned {}", status);
            return Err(ToolError::Upstream(format!(
                "graphql endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        Ok(body)
    }
}
