//! Agent loop - conversation driver
//!
//! One call to the model per round. A tool-use response dispatches every
//! requested tool in order and appends each result to the history before the
//! next round; an end-of-turn response becomes the task's answer artifact.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use assetline_config::Config;
use assetline_provider::{
    ContentBlock, ConverseRequest, ModelMessage, Provider, StopReason, ToolResultContent,
};
use assetline_task::{Artifact, StoreError, Task, TaskEvent, TaskState, TaskStore};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::card::AgentCard;
use crate::context::ContextBuilder;
use crate::publisher::{PublishError, TaskPublisher};
use crate::tools::{self, GraphQlClient};
use crate::{AgentError, ErrorKind, Result};

/// Failure message for a turn submitted without text
pub const EMPTY_MESSAGE: &str = "input message must contain text";

pub const ARTIFACT_NAME: &str = "Inference";
pub const ARTIFACT_DESCRIPTION: &str = "Inference response from model";

/// Result recorded for tool calls that follow an input request in the same response
const SKIPPED_RESULT: &str = "Skipped: awaiting user input";

/// Model and loop parameters
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Empty selects the provider's default model
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Model calls allowed per turn; zero is treated as one
    pub max_tool_rounds: u32,
    pub stream_buffer: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.0,
            max_tokens: 4096,
            max_tool_rounds: 20,
            stream_buffer: 32,
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.default_model(),
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
            max_tool_rounds: config.max_tool_rounds(),
            stream_buffer: config.agent.stream_buffer,
        }
    }
}

/// A user message addressed to the agent
#[derive(Debug, Clone, Default)]
pub struct SendMessageRequest {
    pub text: String,
    /// Continue this task; it must be waiting for input
    pub task_id: Option<String>,
    pub context_id: Option<String>,
}

impl SendMessageRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }
}

/// Outcome of a finished turn
#[derive(Debug)]
pub struct TurnResult {
    /// Snapshot after the turn ended
    pub task: Task,
    /// Why the turn failed, when it did
    pub error: Option<AgentError>,
}

impl TurnResult {
    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    pub fn answer(&self) -> Option<String> {
        self.task.answer()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(AgentError::kind)
    }
}

/// Handle to a turn running in the background
pub struct TurnStream {
    pub task_id: String,
    pub context_id: String,
    events: mpsc::Receiver<TaskEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<TurnResult>>,
}

impl TurnStream {
    /// Next event; `None` once the stream is closed
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        self.events.recv().await
    }

    /// Abandon the turn
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the turn, discarding events not yet received
    pub async fn finish(self) -> Result<TurnResult> {
        drop(self.events);
        self.handle.await?
    }

    /// Drain every event, then wait for the turn
    pub async fn collect(mut self) -> (Vec<TaskEvent>, Result<TurnResult>) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let result = match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        (events, result)
    }
}

/// Result of [`AgentLoop::submit`]
pub enum Submission {
    Completed(TurnResult),
    Streaming(TurnStream),
}

struct PreparedTurn {
    task: Task,
    history: Vec<ModelMessage>,
    text: String,
    cancel: CancellationToken,
}

/// The agent loop drives conversations with the model and its tools
pub struct AgentLoop<P: Provider> {
    provider: Arc<P>,
    store: Arc<dyn TaskStore>,
    graphql: GraphQlClient,
    context: Arc<ContextBuilder>,
    settings: AgentSettings,
    running: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl<P: Provider> Clone for AgentLoop<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            store: self.store.clone(),
            graphql: self.graphql.clone(),
            context: self.context.clone(),
            settings: self.settings.clone(),
            running: self.running.clone(),
        }
    }
}

impl<P: Provider + 'static> AgentLoop<P> {
    pub fn new(
        provider: P,
        store: Arc<dyn TaskStore>,
        graphql: GraphQlClient,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            store,
            graphql,
            context: Arc::new(ContextBuilder::new()),
            settings,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create with GraphQL, model and prompt settings from config
    pub fn from_config(provider: P, store: Arc<dyn TaskStore>, config: &Config) -> Self {
        let graphql = GraphQlClient::new(
            config.graphql.endpoint.clone(),
            config.graphql_token().unwrap_or_default(),
            Duration::from_secs(config.graphql.timeout_secs),
        );
        let agent = Self::new(provider, store, graphql, AgentSettings::from_config(config));
        match &config.agent.system_prompt {
            Some(prompt) => agent.with_context(ContextBuilder::with_system_prompt(prompt.clone())),
            None => agent,
        }
    }

    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = Arc::new(context);
        self
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn agent_card(&self) -> AgentCard {
        AgentCard::asset_management()
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        Ok(self.store.get_task(task_id).await?)
    }

    /// Run a turn to completion
    pub async fn send_message(&self, request: SendMessageRequest) -> Result<TurnResult> {
        self.send_message_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Run a turn to completion, abandoning it when `cancel` fires.
    ///
    /// The turn runs on its own worker; dropping the returned future cancels
    /// it, and the worker still records the cancellation and releases the task.
    pub async fn send_message_with_cancel(
        &self,
        request: SendMessageRequest,
        cancel: CancellationToken,
    ) -> Result<TurnResult> {
        let prepared = self.prepare(request, cancel).await?;
        let guard = prepared.cancel.clone().drop_guard();

        let agent = self.clone();
        let handle = tokio::spawn(async move { agent.run_turn(prepared, None).await });
        let result = handle.await?;

        guard.disarm();
        result
    }

    /// Start a turn in the background and stream its events
    pub async fn send_message_stream(&self, request: SendMessageRequest) -> Result<TurnStream> {
        let prepared = self.prepare(request, CancellationToken::new()).await?;
        let (tx, rx) = mpsc::channel(self.settings.stream_buffer.max(1));

        let task_id = prepared.task.id.clone();
        let context_id = prepared.task.context_id.clone();
        let cancel = prepared.cancel.clone();

        let agent = self.clone();
        let handle = tokio::spawn(async move { agent.run_turn(prepared, Some(tx)).await });

        Ok(TurnStream {
            task_id,
            context_id,
            events: rx,
            cancel,
            handle,
        })
    }

    pub async fn submit(&self, request: SendMessageRequest, streaming: bool) -> Result<Submission> {
        if streaming {
            Ok(Submission::Streaming(self.send_message_stream(request).await?))
        } else {
            Ok(Submission::Completed(self.send_message(request).await?))
        }
    }

    /// Cancel a running or waiting task. Returns false if it had already ended.
    pub async fn cancel_task(&self, task_id: &str) -> Result<bool> {
        let task = self.store.get_task(task_id).await?;
        if task.state().is_terminal() {
            return Ok(false);
        }

        if let Some(token) = self.running.lock().await.get(task_id) {
            token.cancel();
        }

        match self
            .store
            .update_state(task_id, TaskState::Canceled, None)
            .await
        {
            Ok(_) => {
                info!("task {} canceled", task_id);
                Ok(true)
            }
            Err(StoreError::Terminal { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn prepare(
        &self,
        request: SendMessageRequest,
        cancel: CancellationToken,
    ) -> Result<PreparedTurn> {
        let mut running = self.running.lock().await;

        let (task, history) = match request.task_id {
            Some(task_id) => {
                if running.contains_key(&task_id) {
                    return Err(AgentError::InvalidRequest(format!(
                        "task {} is still running",
                        task_id
                    )));
                }
                match self.store.get_task(&task_id).await {
                    Ok(existing) => {
                        if existing.state() != TaskState::InputRequired {
                            return Err(AgentError::InvalidRequest(format!(
                                "task {} is {}; only input-required tasks accept new messages",
                                task_id,
                                existing.state()
                            )));
                        }
                        if let Some(context_id) = &request.context_id {
                            if *context_id != existing.context_id {
                                return Err(AgentError::InvalidRequest(format!(
                                    "task {} belongs to context {}",
                                    task_id, existing.context_id
                                )));
                            }
                        }
                        debug!("resuming task {}", task_id);
                        let history = existing.history.clone();
                        (existing, history)
                    }
                    Err(StoreError::NotFound(_)) => (
                        self.store
                            .create_task(Some(task_id), request.context_id)
                            .await?,
                        Vec::new(),
                    ),
                    Err(e) => return Err(e.into()),
                }
            }
            None => (
                self.store.create_task(None, request.context_id).await?,
                Vec::new(),
            ),
        };

        running.insert(task.id.clone(), cancel.clone());

        Ok(PreparedTurn {
            task,
            history,
            text: request.text,
            cancel,
        })
    }

    async fn run_turn(
        &self,
        prepared: PreparedTurn,
        tx: Option<mpsc::Sender<TaskEvent>>,
    ) -> Result<TurnResult> {
        let PreparedTurn {
            task,
            mut history,
            text,
            cancel,
        } = prepared;

        let publisher = Arc::new(TaskPublisher::new(
            self.store.clone(),
            task.id.clone(),
            task.context_id.clone(),
            tx,
            cancel.clone(),
        ));
        info!("task {} turn started", task.id);

        let outcome = match self.drive(&publisher, &mut history, &text, &cancel).await {
            Err(_) if cancel.is_cancelled() => Err(AgentError::Canceled),
            other => other,
        };

        if let Err(err) = &outcome {
            if err.kind() != ErrorKind::Cancellation {
                error!("task {} failed: {}", task.id, err);
                if publisher.finished().await.is_none() {
                    if let Err(e) = publisher
                        .status(TaskState::Failed, Some(err.to_string()))
                        .await
                    {
                        warn!("task {} failure could not be recorded: {}", task.id, e);
                    }
                }
            }
        }
        publisher.close().await;

        if let Err(e) = self.store.set_history(&task.id, history).await {
            warn!("task {} history not saved: {}", task.id, e);
        }
        self.running.lock().await.remove(&task.id);

        match outcome {
            Ok(()) => Ok(TurnResult {
                task: self.store.get_task(&task.id).await?,
                error: None,
            }),
            Err(AgentError::Canceled) => {
                match self
                    .store
                    .update_state(&task.id, TaskState::Canceled, None)
                    .await
                {
                    Ok(_) | Err(StoreError::Terminal { .. }) => {}
                    Err(e) => warn!("task {} cancellation not recorded: {}", task.id, e),
                }
                info!("task {} canceled", task.id);
                Err(AgentError::Canceled)
            }
            Err(err) => Ok(TurnResult {
                task: self.store.get_task(&task.id).await?,
                error: Some(err),
            }),
        }
    }

    async fn drive(
        &self,
        publisher: &Arc<TaskPublisher>,
        history: &mut Vec<ModelMessage>,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        publisher.start_working().await?;

        if text.trim().is_empty() {
            return Err(AgentError::InvalidRequest(EMPTY_MESSAGE.to_string()));
        }
        *history = self.context.build_messages(std::mem::take(history), text);

        let registry = tools::turn_registry(self.graphql.clone(), publisher.clone());
        debug!("task {} tools: {:?}", publisher.task_id(), registry.names());
        let tool_specs = registry.schemas_for_model();
        let system_prompt = self.context.build_system_prompt();
        let model = if self.settings.model.is_empty() {
            self.provider.default_model()
        } else {
            self.settings.model.clone()
        };

        let max_rounds = self.settings.max_tool_rounds.max(1);
        for round in 1..=max_rounds {
            debug!("task {} round {}", publisher.task_id(), round);

            let request = ConverseRequest {
                model: model.clone(),
                system_prompt: system_prompt.clone(),
                messages: history.clone(),
                tools: tool_specs.clone(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            };

            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Canceled),
                output = self.provider.converse(request) => output?,
            };
            debug!(
                "task {} stop reason {}",
                publisher.task_id(),
                output.stop_reason
            );

            for block in &output.message.content {
                if let ContentBlock::Unsupported { kind } = block {
                    warn!("task {} ignoring '{}' content block", publisher.task_id(), kind);
                }
            }

            match output.stop_reason {
                StopReason::EndTurn => {
                    let answer = output.message.first_text().map(str::to_string).ok_or_else(|| {
                        AgentError::InvalidResponse("end of turn without a text block".to_string())
                    })?;
                    ContextBuilder::add_assistant_message(history, output.message);

                    let artifact = Artifact::text(0, answer)
                        .with_name(ARTIFACT_NAME)
                        .with_description(ARTIFACT_DESCRIPTION);
                    publisher.artifact(artifact, true, false).await?;
                    publisher.status(TaskState::Completed, None).await?;
                    info!("task {} completed after {} rounds", publisher.task_id(), round);
                    return Ok(());
                }
                StopReason::ToolUse => {
                    let uses = output.message.tool_uses();
                    if uses.is_empty() {
                        return Err(AgentError::InvalidResponse(
                            "tool use requested without a tool use block".to_string(),
                        ));
                    }
                    let reasoning = output.message.first_text().map(str::to_string);
                    ContextBuilder::add_assistant_message(history, output.message);

                    if let Some(reasoning) = reasoning {
                        self.announce(publisher, reasoning).await?;
                    }

                    for tool_use in uses {
                        if publisher.finished().await.is_some() {
                            debug!("skipping {} after input request", tool_use.name);
                            ContextBuilder::add_tool_result(
                                history,
                                &tool_use.id,
                                vec![ToolResultContent::Text {
                                    text: SKIPPED_RESULT.to_string(),
                                }],
                            );
                            continue;
                        }

                        info!("task {} invoking {}", publisher.task_id(), tool_use.name);
                        let result = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(AgentError::Canceled),
                            result = registry.dispatch(&tool_use.name, tool_use.input) => result?,
                        };
                        ContextBuilder::add_tool_result(history, &tool_use.id, result.content);
                    }

                    if let Some(state) = publisher.finished().await {
                        info!("task {} paused: {}", publisher.task_id(), state);
                        return Ok(());
                    }
                }
                other => return Err(AgentError::UnsupportedStopReason(other)),
            }
        }

        Err(AgentError::MaxIterations(max_rounds))
    }

    /// Publish reasoning that accompanied a tool request
    async fn announce(&self, publisher: &TaskPublisher, text: String) -> Result<()> {
        match publisher.status(TaskState::Working, Some(text)).await {
            Ok(()) => Ok(()),
            Err(PublishError::Canceled) => Err(AgentError::Canceled),
            Err(e) => {
                warn!(
                    "task {} progress update dropped: {}",
                    publisher.task_id(),
                    e
                );
                Ok(())
            }
        }
    }
}
