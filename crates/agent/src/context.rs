//! Context builder for assembling agent prompts

use chrono::Local;

use assetline_provider::{ModelMessage, ToolResultContent};

/// Instructions given to the model for every turn
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an IT Technician who helps customers understand and manage the devices (assets) they look after.

Think before you reply in <thinking> tags.

When answering a question:
1. Check the knowledge articles first using the knowledge_query tool if the question is about a problem or symptom.
2. Always fetch the GraphQL schema with the query_schema tool before constructing any query.
3. Use execute_query to search for assets, or asset_details when the user names a specific asset.
4. Summarise what you found, naming the assets involved.

If you cannot proceed without more information from the user, call the user_input_required tool with a short description of what you need."#;

/// Builds the system prompt and history for a turn
pub struct ContextBuilder {
    system_prompt: String,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the default instructions
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Build the system prompt
    pub fn build_system_prompt(&self) -> String {
        let now = Local::now().format("%Y-%m-%d %H:%M (%A)");
        format!("{}\n\n## Current Time\n{}", self.system_prompt, now)
    }

    /// Prior history followed by the new user message
    pub fn build_messages(
        &self,
        history: Vec<ModelMessage>,
        current_message: &str,
    ) -> Vec<ModelMessage> {
        let mut messages = history;
        messages.push(ModelMessage::user_text(current_message));
        messages
    }

    /// Add a tool result to messages
    pub fn add_tool_result(
        messages: &mut Vec<ModelMessage>,
        tool_use_id: &str,
        content: Vec<ToolResultContent>,
    ) {
        messages.push(ModelMessage::tool_result(tool_use_id, content));
    }

    /// Add the model's response to messages
    pub fn add_assistant_message(messages: &mut Vec<ModelMessage>, message: ModelMessage) {
        messages.push(message);
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
