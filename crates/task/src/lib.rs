//! Task model for assetline
//!
//! A task is the record of one conversation turn (or a chain of turns resumed
//! after an input request). Progress is expressed as [`TaskEvent`]s: status
//! updates and artifact updates.

use assetline_provider::ModelMessage;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub mod store;

pub use store::{InMemoryTaskStore, StoreError, TaskStore};

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Created,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// No further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }

    /// The state closes the event sequence of a turn
    pub fn ends_turn(&self) -> bool {
        self.is_terminal() || *self == TaskState::InputRequired
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Created => "created",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content part of an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    Data { data: serde_json::Value },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::Data { .. } => None,
        }
    }
}

/// Current status of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl TaskStatus {
    pub fn new(state: TaskState, message: Option<String>) -> Self {
        Self {
            state,
            message,
            timestamp: Local::now(),
        }
    }
}

/// Named output attached to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub index: u32,
    pub parts: Vec<Part>,
    #[serde(default)]
    pub append: bool,
    #[serde(default)]
    pub last_chunk: bool,
}

impl Artifact {
    /// A single-part text artifact with a fresh id
    pub fn text(index: u32, text: impl Into<String>) -> Self {
        Self {
            artifact_id: uuid::Uuid::new_v4().to_string(),
            name: None,
            description: None,
            index,
            parts: vec![Part::text(text)],
            append: false,
            last_chunk: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn last_chunk(mut self, last_chunk: bool) -> Self {
        self.last_chunk = last_chunk;
        self
    }

    /// Concatenated text of all text parts
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Merge an appended chunk in arrival order
    pub fn merge(&mut self, chunk: Artifact) {
        self.parts.extend(chunk.parts);
        self.last_chunk = chunk.last_chunk;
        if chunk.name.is_some() {
            self.name = chunk.name;
        }
        if chunk.description.is_some() {
            self.description = chunk.description;
        }
    }
}

/// Progress notification for a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TaskEvent {
    StatusUpdate {
        task_id: String,
        context_id: String,
        status: TaskStatus,
        #[serde(rename = "final")]
        is_final: bool,
    },
    ArtifactUpdate {
        task_id: String,
        context_id: String,
        artifact: Artifact,
        append: bool,
        last_chunk: bool,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::StatusUpdate { task_id, .. } | TaskEvent::ArtifactUpdate { task_id, .. } => {
                task_id
            }
        }
    }

    /// State carried by a status update
    pub fn state(&self) -> Option<TaskState> {
        match self {
            TaskEvent::StatusUpdate { status, .. } => Some(status.state),
            TaskEvent::ArtifactUpdate { .. } => None,
        }
    }

    /// Whether this event ends the sequence for a turn
    pub fn ends_turn(&self) -> bool {
        self.state().map(|s| s.ends_turn()).unwrap_or(false)
    }
}

/// Snapshot of a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Model exchange accumulated across turns
    #[serde(default)]
    pub history: Vec<ModelMessage>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl Task {
    pub fn new(id: impl Into<String>, context_id: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: TaskStatus::new(TaskState::Created, None),
            artifacts: Vec::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> TaskState {
        self.status.state
    }

    /// Text of the first last-chunk artifact
    pub fn answer(&self) -> Option<String> {
        self.artifacts
            .iter()
            .find(|a| a.last_chunk)
            .map(Artifact::text_content)
    }
}

/// Generate an opaque identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
