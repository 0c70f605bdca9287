//! Task storage

use crate::{new_id, Artifact, Task, TaskEvent, TaskState, TaskStatus};
use assetline_provider::ModelMessage;
use async_trait::async_trait;
use chrono::Local;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

const SUBSCRIBER_CAPACITY: usize = 64;

/// Task store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already exists: {0}")]
    AlreadyExists(String),

    #[error("task {task_id} is already {state}")]
    Terminal { task_id: String, state: TaskState },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage for task snapshots and their event feeds
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a task, generating any identifier not supplied
    async fn create_task(&self, task_id: Option<String>, context_id: Option<String>)
        -> Result<Task>;

    async fn get_task(&self, task_id: &str) -> Result<Task>;

    /// Record a new status
    async fn update_state(
        &self,
        task_id: &str,
        state: TaskState,
        message: Option<String>,
    ) -> Result<TaskStatus>;

    /// Attach an artifact, merging appended chunks into the artifact with the same id
    async fn add_artifact(
        &self,
        task_id: &str,
        artifact: Artifact,
        is_final: bool,
        append: bool,
    ) -> Result<()>;

    /// Replace the stored model history
    async fn set_history(&self, task_id: &str, history: Vec<ModelMessage>) -> Result<()>;

    /// Send an event to the task's subscribers
    async fn publish(&self, event: TaskEvent) -> Result<()>;

    /// Receive every event published for the task from now on
    async fn subscribe(&self, task_id: &str) -> Result<broadcast::Receiver<TaskEvent>>;
}

struct Entry {
    task: Task,
    events: broadcast::Sender<TaskEvent>,
}

/// Process-local task store
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Entry>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(
        &self,
        task_id: Option<String>,
        context_id: Option<String>,
    ) -> Result<Task> {
        let id = task_id.unwrap_or_else(new_id);
        let context_id = context_id.unwrap_or_else(new_id);

        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }

        let task = Task::new(id.clone(), context_id);
        let (events, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        tasks.insert(
            id.clone(),
            Entry {
                task: task.clone(),
                events,
            },
        );
        debug!("task {} created in context {}", id, task.context_id);
        Ok(task)
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|e| e.task.clone())
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }

    async fn update_state(
        &self,
        task_id: &str,
        state: TaskState,
        message: Option<String>,
    ) -> Result<TaskStatus> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;

        let current = entry.task.status.state;
        if current.is_terminal() {
            return Err(StoreError::Terminal {
                task_id: task_id.to_string(),
                state: current,
            });
        }

        let status = TaskStatus::new(state, message);
        entry.task.status = status.clone();
        entry.task.updated_at = Local::now();
        trace!("◆ task {} {} -> {}", task_id, current, state);

        Ok(status)
    }

    async fn add_artifact(
        &self,
        task_id: &str,
        mut artifact: Artifact,
        is_final: bool,
        append: bool,
    ) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;

        if entry.task.status.state.is_terminal() {
            return Err(StoreError::Terminal {
                task_id: task_id.to_string(),
                state: entry.task.status.state,
            });
        }

        artifact.append = append;
        artifact.last_chunk = is_final;

        let existing = entry
            .task
            .artifacts
            .iter_mut()
            .find(|a| a.artifact_id == artifact.artifact_id);
        match existing {
            Some(current) if append => current.merge(artifact),
            Some(current) => *current = artifact,
            None => entry.task.artifacts.push(artifact),
        }
        entry.task.updated_at = Local::now();

        Ok(())
    }

    async fn set_history(&self, task_id: &str, history: Vec<ModelMessage>) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        entry.task.history = history;
        entry.task.updated_at = Local::now();
        Ok(())
    }

    async fn publish(&self, event: TaskEvent) -> Result<()> {
        let tasks = self.tasks.read().await;
        let entry = tasks
            .get(event.task_id())
            .ok_or_else(|| StoreError::NotFound(event.task_id().to_string()))?;
        // No subscribers is not an error
        let _ = entry.events.send(event);
        Ok(())
    }

    async fn subscribe(&self, task_id: &str) -> Result<broadcast::Receiver<TaskEvent>> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|e| e.events.subscribe())
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_generates_ids() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task(None, None).await.unwrap();
        assert!(!task.id.is_empty());
        assert!(!task.context_id.is_empty());
        assert_ne!(task.id, task.context_id);
        assert_eq!(task.state(), TaskState::Created);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_rejected() {
        let store = InMemoryTaskStore::new();
        store
            .create_task(Some("t1".to_string()), None)
            .await
            .unwrap();
        let err = store
            .create_task(Some("t1".to_string()), None)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::AlreadyExists("t1".to_string()));
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task(None, None).await.unwrap();
        store
            .update_state(&task.id, TaskState::Failed, Some("boom".to_string()))
            .await
            .unwrap();

        let err = store
            .update_state(&task.id, TaskState::Working, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Terminal { state: TaskState::Failed, .. }));
    }

    #[tokio::test]
    async fn test_updates_do_not_publish() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task(None, None).await.unwrap();
        let mut rx = store.subscribe(&task.id).await.unwrap();

        store
            .update_state(&task.id, TaskState::Working, None)
            .await
            .unwrap();
        store
            .add_artifact(&task.id, Artifact::text(0, "draft"), false, false)
            .await
            .unwrap();

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_publish_unknown_task() {
        let store = InMemoryTaskStore::new();
        let event = TaskEvent::StatusUpdate {
            task_id: "ghost".to_string(),
            context_id: "ctx".to_string(),
            status: TaskStatus::new(TaskState::Working, None),
            is_final: false,
        };
        let err = store.publish(event).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("ghost".to_string()));
    }
}
