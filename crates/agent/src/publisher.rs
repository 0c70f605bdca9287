//! Task event publisher
//!
//! Records every transition of a turn in the task store and, for streaming
//! turns, forwards the same events in order to the caller's channel. An event
//! reaches the store's subscribers only once the channel has taken it, so both
//! feeds carry the same sequence. The channel is closed exactly once: after an
//! event that ends the turn, on cancellation, or when [`TaskPublisher::close`]
//! is called.

use std::sync::Arc;

use assetline_task::{Artifact, StoreError, TaskEvent, TaskState, TaskStore};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Event publishing errors
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("task store rejected event: {0}")]
    Store(#[from] StoreError),

    #[error("event stream already closed after {0}")]
    Closed(TaskState),

    #[error("turn canceled")]
    Canceled,
}

struct Sink {
    tx: Option<mpsc::Sender<TaskEvent>>,
    finished: Option<TaskState>,
}

pub struct TaskPublisher {
    store: Arc<dyn TaskStore>,
    task_id: String,
    context_id: String,
    cancel: CancellationToken,
    sink: Mutex<Sink>,
}

impl TaskPublisher {
    pub fn new(
        store: Arc<dyn TaskStore>,
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        tx: Option<mpsc::Sender<TaskEvent>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            task_id: task_id.into(),
            context_id: context_id.into(),
            cancel,
            sink: Mutex::new(Sink { tx, finished: None }),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Mark the task as working without notifying the stream
    pub async fn start_working(&self) -> Result<(), PublishError> {
        if self.cancel.is_cancelled() {
            return Err(PublishError::Canceled);
        }
        self.store
            .update_state(&self.task_id, TaskState::Working, None)
            .await?;
        Ok(())
    }

    /// Record a status update and forward it
    pub async fn status(
        &self,
        state: TaskState,
        message: Option<String>,
    ) -> Result<(), PublishError> {
        let mut sink = self.sink.lock().await;
        self.check_open(&sink)?;

        let status = self
            .store
            .update_state(&self.task_id, state, message)
            .await?;
        let event = TaskEvent::StatusUpdate {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            status,
            is_final: state.ends_turn(),
        };
        self.deliver(&mut sink, event).await?;

        if state.ends_turn() {
            sink.finished = Some(state);
            sink.tx = None;
            debug!("task {} event stream closed after {}", self.task_id, state);
        }
        Ok(())
    }

    /// Record an artifact and forward it
    pub async fn artifact(
        &self,
        artifact: Artifact,
        is_final: bool,
        append: bool,
    ) -> Result<(), PublishError> {
        let mut sink = self.sink.lock().await;
        self.check_open(&sink)?;

        self.store
            .add_artifact(&self.task_id, artifact.clone(), is_final, append)
            .await?;

        let mut artifact = artifact;
        artifact.append = append;
        artifact.last_chunk = is_final;
        let event = TaskEvent::ArtifactUpdate {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            artifact,
            append,
            last_chunk: is_final,
        };
        self.deliver(&mut sink, event).await
    }

    /// State that ended the turn, if any
    pub async fn finished(&self) -> Option<TaskState> {
        self.sink.lock().await.finished
    }

    /// Close the stream; later calls do nothing
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if sink.tx.take().is_some() {
            trace!("◆ task {} event stream closed", self.task_id);
        }
    }

    fn check_open(&self, sink: &Sink) -> Result<(), PublishError> {
        if let Some(state) = sink.finished {
            return Err(PublishError::Closed(state));
        }
        if self.cancel.is_cancelled() {
            return Err(PublishError::Canceled);
        }
        Ok(())
    }

    async fn deliver(&self, sink: &mut Sink, event: TaskEvent) -> Result<(), PublishError> {
        if let Some(tx) = sink.tx.clone() {
            let delivered = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                sent = tx.send(event.clone()) => Some(sent.is_ok()),
            };
            drop(tx);

            match delivered {
                None => {
                    sink.tx = None;
                    return Err(PublishError::Canceled);
                }
                Some(false) => {
                    warn!(
                        "task {} subscriber went away, dropping further events",
                        self.task_id
                    );
                    sink.tx = None;
                }
                Some(true) => {}
            }
        }

        self.store.publish(event).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetline_task::InMemoryTaskStore;

    async fn setup(
        buffer: usize,
    ) -> (
        Arc<InMemoryTaskStore>,
        TaskPublisher,
        mpsc::Receiver<TaskEvent>,
        CancellationToken,
    ) {
        let store = Arc::new(InMemoryTaskStore::new());
        let task = store.create_task(None, None).await.unwrap();
        let (tx, rx) = mpsc::channel(buffer);
        let cancel = CancellationToken::new();
        let publisher = TaskPublisher::new(
            store.clone(),
            task.id,
            task.context_id,
            Some(tx),
            cancel.clone(),
        );
        (store, publisher, rx, cancel)
    }

    #[tokio::test]
    async fn test_start_working_emits_nothing() {
        let (store, publisher, mut rx, _) = setup(4).await;
        publisher.start_working().await.unwrap();
        publisher.close().await;

        assert!(rx.recv().await.is_none());
        let task = store.get_task(publisher.task_id()).await.unwrap();
        assert_eq!(task.state(), TaskState::Working);
    }

    #[tokio::test]
    async fn test_final_status_closes_stream() {
        let (_, publisher, mut rx, _) = setup(4).await;
        publisher
            .status(TaskState::Working, Some("thinking".to_string()))
            .await
            .unwrap();
        publisher
            .status(TaskState::InputRequired, Some("Which asset ID?".to_string()))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().state(), Some(TaskState::Working));
        let last = rx.recv().await.unwrap();
        assert_eq!(last.state(), Some(TaskState::InputRequired));
        assert!(last.ends_turn());
        assert!(rx.recv().await.is_none());
        assert_eq!(publisher.finished().await, Some(TaskState::InputRequired));
    }

    #[tokio::test]
    async fn test_no_events_after_close() {
        let (_, publisher, _rx, _) = setup(4).await;
        publisher.status(TaskState::Completed, None).await.unwrap();

        let err = publisher
            .status(TaskState::Working, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Closed(TaskState::Completed)));
        assert!(publisher
            .artifact(Artifact::text(0, "late"), true, false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_, publisher, mut rx, _) = setup(4).await;
        publisher.close().await;
        publisher.close().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_not_fatal() {
        let (store, publisher, rx, _) = setup(4).await;
        drop(rx);

        publisher
            .artifact(Artifact::text(0, "answer"), true, false)
            .await
            .unwrap();
        publisher.status(TaskState::Completed, None).await.unwrap();

        let task = store.get_task(publisher.task_id()).await.unwrap();
        assert_eq!(task.state(), TaskState::Completed);
        assert_eq!(task.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_channel() {
        let (_, publisher, mut rx, cancel) = setup(1).await;
        publisher.status(TaskState::Working, None).await.unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        // The buffer is full so this send waits until the token fires
        let err = publisher
            .status(TaskState::Working, Some("more".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Canceled));

        assert_eq!(rx.recv().await.unwrap().state(), Some(TaskState::Working));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_sync_publisher_records_only() {
        let store = Arc::new(InMemoryTaskStore::new());
        let task = store.create_task(None, None).await.unwrap();
        let publisher = TaskPublisher::new(
            store.clone(),
            task.id.clone(),
            task.context_id,
            None,
            CancellationToken::new(),
        );

        publisher
            .artifact(Artifact::text(0, "done").with_name("Inference"), true, false)
            .await
            .unwrap();
        publisher.status(TaskState::Completed, None).await.unwrap();

        let task = store.get_task(&task.id).await.unwrap();
        assert_eq!(task.state(), TaskState::Completed);
        assert_eq!(task.answer().as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_store_feed_matches_stream() {
        let (store, publisher, mut rx, _) = setup(4).await;
        let mut feed = store.subscribe(publisher.task_id()).await.unwrap();

        publisher.start_working().await.unwrap();
        publisher
            .status(TaskState::Working, Some("thinking".to_string()))
            .await
            .unwrap();
        publisher
            .artifact(Artifact::text(0, "answer"), true, false)
            .await
            .unwrap();
        publisher.status(TaskState::Completed, None).await.unwrap();

        let mut streamed = Vec::new();
        while let Some(event) = rx.recv().await {
            streamed.push(event);
        }
        let mut published = Vec::new();
        while let Ok(event) = feed.try_recv() {
            published.push(event);
        }

        assert_eq!(streamed.len(), 3);
        assert_eq!(published, streamed);
    }

    #[tokio::test]
    async fn test_canceled_event_not_published() {
        let (store, publisher, _rx, cancel) = setup(1).await;
        let mut feed = store.subscribe(publisher.task_id()).await.unwrap();
        publisher.status(TaskState::Working, None).await.unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = publisher
            .status(TaskState::Working, Some("more".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Canceled));

        assert_eq!(feed.try_recv().unwrap().state(), Some(TaskState::Working));
        assert!(matches!(
            feed.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }
}
