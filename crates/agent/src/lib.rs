//! Asset management agent
//!
//! Drives a tool-using conversation with a language model and reports
//! progress as task events.

use assetline_provider::{ProviderError, StopReason};
use assetline_task::StoreError;
use thiserror::Error;

pub mod card;
pub mod context;
pub mod loop_agent;
pub mod publisher;
pub mod tools;

pub use card::{AgentCard, AgentSkill};
pub use context::ContextBuilder;
pub use loop_agent::{
    AgentLoop, AgentSettings, SendMessageRequest, Submission, TurnResult, TurnStream,
};
pub use publisher::{PublishError, TaskPublisher};
pub use tools::{GraphQlClient, ToolError, ToolOutput, ToolRegistry, ToolTrait};

/// Failure classes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingParameter,
    InvalidParameter,
    UpstreamFailure,
    UnknownTool,
    UnsupportedStopReason,
    PublishFailure,
    Cancellation,
    InvalidResponse,
    IterationLimit,
    InvalidRequest,
    Internal,
}

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool {tool} failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("unsupported stop reason: {0}")]
    UnsupportedStopReason(StopReason),

    #[error("unexpected model response: {0}")]
    InvalidResponse(String),

    #[error("exceeded {0} tool rounds")]
    MaxIterations(u32),

    #[error("turn canceled")]
    Canceled,

    #[error("event publish failed: {0}")]
    Publish(PublishError),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("task store error: {0}")]
    Store(#[from] StoreError),

    #[error("turn worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<PublishError> for AgentError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Canceled => AgentError::Canceled,
            other => AgentError::Publish(other),
        }
    }
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::UnknownTool(_) => ErrorKind::UnknownTool,
            AgentError::Tool { source, .. } => source.kind(),
            AgentError::Provider(_) => ErrorKind::UpstreamFailure,
            AgentError::UnsupportedStopReason(_) => ErrorKind::UnsupportedStopReason,
            AgentError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            AgentError::MaxIterations(_) => ErrorKind::IterationLimit,
            AgentError::Canceled => ErrorKind::Cancellation,
            AgentError::Publish(_) | AgentError::Store(_) => ErrorKind::PublishFailure,
            AgentError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AgentError::Join(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
