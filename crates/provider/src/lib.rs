//! Language model access for assetline
//!
//! Model messages are sequences of typed content blocks. A provider takes a
//! system prompt, the message history and the tool schemas for a turn, and
//! returns one response message together with the reason the model stopped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use thiserror::Error;
use tracing::{debug, trace};

pub mod openrouter;

pub use openrouter::OpenRouterProvider;

/// Model endpoint errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model response decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model endpoint rejected request: {0}")]
    Api(String),

    #[error("no model api key configured")]
    NoApiKey,

    #[error("malformed model response")]
    InvalidResponse,

    #[error("model endpoint rate limited")]
    RateLimited,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Author of a model message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Payload of a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    Text { text: String },
    Json { json: Value },
}

impl ToolResultContent {
    /// Render as plain text for endpoints that only accept strings
    pub fn as_text(&self) -> String {
        match self {
            ToolResultContent::Text { text } => text.clone(),
            ToolResultContent::Json { json } => json.to_string(),
        }
    }
}

/// One block of a model message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Vec<ToolResultContent>,
    },
    /// A block kind this crate does not model (images, reasoning, ...)
    Unsupported {
        kind: String,
    },
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Message exchanged with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ModelMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// A user message carrying one tool result
    pub fn tool_result(tool_use_id: impl Into<String>, content: Vec<ToolResultContent>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content,
            }],
        }
    }

    /// First text block, if any
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Tool-use blocks in the order the model emitted them
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    ContentFiltered,
    GuardrailIntervened,
    Other(String),
}

impl StopReason {
    /// Map an OpenAI-style finish reason
    pub fn from_finish_reason(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" => StopReason::EndTurn,
            "tool_calls" | "function_call" | "tool_use" => StopReason::ToolUse,
            "length" | "max_tokens" => StopReason::MaxTokens,
            "content_filter" => StopReason::ContentFiltered,
            "guardrail_intervened" => StopReason::GuardrailIntervened,
            other => StopReason::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EndTurn => write!(f, "end_turn"),
            StopReason::ToolUse => write!(f, "tool_use"),
            StopReason::MaxTokens => write!(f, "max_tokens"),
            StopReason::ContentFiltered => write!(f, "content_filtered"),
            StopReason::GuardrailIntervened => write!(f, "guardrail_intervened"),
            StopReason::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// Resource consumption
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Tool schema presented to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// One converse call
#[derive(Debug, Clone)]
pub struct ConverseRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolSpec>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ConverseRequest {
    fn default() -> Self {
        Self {
            model: String::new(),
            system_prompt: String::new(),
            messages: Vec::new(),
            tools: Vec::new(),
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

/// Result of one converse call
#[derive(Debug, Clone, PartialEq)]
pub struct ConverseOutput {
    pub stop_reason: StopReason,
    pub message: ModelMessage,
    pub usage: Usage,
}

impl ConverseOutput {
    /// A plain end-of-turn text answer
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            stop_reason: StopReason::EndTurn,
            message: ModelMessage::assistant_text(text),
            usage: Usage::default(),
        }
    }

    /// A tool-use response, optionally preceded by reasoning text
    pub fn tool_uses(text: Option<&str>, uses: Vec<ToolUse>) -> Self {
        let mut content = Vec::new();
        if let Some(text) = text {
            content.push(ContentBlock::Text {
                text: text.to_string(),
            });
        }
        for tool_use in uses {
            content.push(ContentBlock::ToolUse {
                id: tool_use.id,
                name: tool_use.name,
                input: tool_use.input,
            });
        }
        Self {
            stop_reason: StopReason::ToolUse,
            message: ModelMessage {
                role: Role::Assistant,
                content,
            },
            usage: Usage::default(),
        }
    }
}

/// Language model endpoint
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send the history and return the model's next message
    async fn converse(&self, request: ConverseRequest) -> Result<ConverseOutput>;

    fn default_model(&self) -> String;

    fn is_configured(&self) -> bool;
}

/// Log the shape of a response
pub(crate) fn log_output(output: &ConverseOutput) {
    debug!(
        stop_reason = %output.stop_reason,
        blocks = output.message.content.len(),
        "model response"
    );
    for block in &output.message.content {
        if let ContentBlock::ToolUse { name, id, .. } = block {
            trace!("◆ tool use requested: {} ({})", name, id);
        }
    }
}
