//! user_input_required: pause the task for user input

use std::sync::Arc;

use assetline_task::TaskState;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{required_str, ToolError, ToolOutput, ToolTrait};
use crate::publisher::TaskPublisher;

pub const NAME: &str = "user_input_required";
pub const DESCRIPTION: &str =
    "This tool can be used when you require input from the user before proceeding with a task.";

pub const RESULT_TEXT: &str = "Successfully set task status to input required";

/// Bound to the publisher of the turn it was built for
pub struct UserInputTool {
    publisher: Arc<TaskPublisher>,
}

impl UserInputTool {
    pub fn new(publisher: Arc<TaskPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl ToolTrait for UserInputTool {
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
                "reason": {
                    "type": "string",
                    "description": "The input required from the user to proceed with the task."
                }
            },
            "required": ["reason"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let reason = required_str(&args, "reason")?;
        info!(
            "task {} awaiting user input: {}",
            self.publisher.task_id(),
            reason
        );

        self.publisher
            .status(TaskState::InputRequired, Some(reason))
            .await
            .map_err(|e| ToolError::PublishFailure(e.to_string()))?;

        Ok(ToolOutput::text(RESULT_TEXT))
    }
}
