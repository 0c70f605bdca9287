//! Assetline command implementations

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use assetline_agent::{AgentCard, AgentError, AgentLoop, SendMessageRequest, TurnResult};
use assetline_config::{self, Config};
use assetline_provider::OpenRouterProvider;
use assetline_task::{InMemoryTaskStore, Task, TaskEvent, TaskState, TaskStore};

type Agent = AgentLoop<OpenRouterProvider>;

/// Options for a one-shot question
pub struct AskArgs {
    pub message: String,
    pub stream: bool,
    pub task_id: Option<String>,
    pub context_id: Option<String>,
    pub model: Option<String>,
}

/// Build an agent from the saved config, applying command-line overrides
fn build_agent(mut config: Config, model: Option<String>) -> Result<Agent> {
    if let Some(model) = model {
        config.model.model = model;
    }

    let api_key = config.api_key().with_context(|| {
        format!(
            "No API key configured. Set one in {} or {}",
            assetline_config::config_path().display(),
            assetline_config::API_KEY_ENV
        )
    })?;
    if config.graphql_token().is_none() {
        warn!(
            "no GraphQL token configured; set graphql.token or {}",
            assetline_config::GRAPHQL_TOKEN_ENV
        );
    }

    let provider =
        OpenRouterProvider::new(api_key, config.api_base(), Some(config.default_model()));
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    Ok(AgentLoop::from_config(provider, store, &config))
}

/// Print an event from a streaming turn
fn print_event(event: &TaskEvent) {
    match event {
        TaskEvent::StatusUpdate { status, .. } => match (status.state, &status.message) {
            (TaskState::Working, Some(message)) => println!("… {}", message),
            (TaskState::InputRequired, message) => {
                println!("\n◆ Input required: {}", message.as_deref().unwrap_or(""))
            }
            (TaskState::Failed, message) => {
                println!("\n✗ Failed: {}", message.as_deref().unwrap_or("unknown error"))
            }
            (state, _) => debug!("task state {}", state),
        },
        TaskEvent::ArtifactUpdate { artifact, .. } => {
            println!("\n◆ {}", artifact.text_content());
        }
    }
}

/// Print the outcome of a turn that was not streamed
fn print_result(task: &Task) {
    match task.state() {
        TaskState::Completed => {
            println!("\n◆ {}", task.answer().unwrap_or_default());
        }
        TaskState::InputRequired => {
            println!(
                "\n◆ Input required: {}",
                task.status.message.as_deref().unwrap_or("")
            );
        }
        TaskState::Failed => {
            println!(
                "\n✗ Failed: {}",
                task.status.message.as_deref().unwrap_or("unknown error")
            );
        }
        state => println!("\n◆ Task ended in state {}", state),
    }
}

/// Run one turn, cancelling it on Ctrl-C. Returns `None` if it was canceled.
async fn run_turn(
    agent: &Agent,
    request: SendMessageRequest,
    stream: bool,
) -> Result<Option<Task>> {
    let outcome = if stream {
        let mut turn = agent.send_message_stream(request).await?;
        debug!("streaming task {}", turn.task_id);
        loop {
            tokio::select! {
                event = turn.recv() => match event {
                    Some(event) => print_event(&event),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("◆ interrupt received, canceling task {}", turn.task_id);
                    turn.cancel();
                }
            }
        }
        turn.finish().await
    } else {
        let cancel = CancellationToken::new();
        let turn = agent.send_message_with_cancel(request, cancel.clone());
        tokio::pin!(turn);
        let outcome = tokio::select! {
            outcome = &mut turn => outcome,
            _ = tokio::signal::ctrl_c() => {
                info!("◆ interrupt received, canceling turn");
                cancel.cancel();
                turn.await
            }
        };
        if let Ok(result) = &outcome {
            print_result(&result.task);
        }
        outcome
    };

    match outcome {
        Ok(TurnResult { task, error }) => {
            if let Some(err) = error {
                debug!("task {} error kind {:?}", task.id, err.kind());
            }
            Ok(Some(task))
        }
        Err(AgentError::Canceled) => {
            println!("\n◆ Canceled");
            Ok(None)
        }
        Err(e) => Err(e).context("turn could not run"),
    }
}

/// Ask a single question
pub async fn ask_command(args: AskArgs) -> Result<()> {
    let config = Config::load().await?;
    let agent = build_agent(config, args.model)?;

    let mut request = SendMessageRequest::new(args.message);
    request.task_id = args.task_id;
    request.context_id = args.context_id;

    let Some(task) = run_turn(&agent, request, args.stream).await? else {
        return Ok(());
    };

    match task.state() {
        TaskState::Failed => anyhow::bail!("task {} failed", task.id),
        TaskState::InputRequired => {
            println!("(task {}, context {})", task.id, task.context_id);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Interactive conversation; answers to input requests continue the same task
pub async fn chat_command(stream: bool, model: Option<String>) -> Result<()> {
    let config = Config::load().await?;
    let agent = build_agent(config, model)?;

    println!("◆ Interactive mode (type 'exit' to quit)");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut context_id: Option<String> = None;
    let mut waiting: Option<String> = None;

    loop {
        print!("◆ ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let mut request = SendMessageRequest::new(input);
        request.context_id = context_id.clone();
        request.task_id = waiting.take();

        if let Some(task) = run_turn(&agent, request, stream).await? {
            context_id = Some(task.context_id.clone());
            if task.state() == TaskState::InputRequired {
                waiting = Some(task.id);
            }
        }
        println!();
    }

    Ok(())
}

/// Write a default config
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing Assetline...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = assetline_config::init()
        .await
        .context("could not write config")?;

    println!("Config: {}", assetline_config::config_path().display());
    println!("\n◆ Assetline initialized");
    println!("\nNext steps:");
    if !config.has_api_key() {
        println!(
            "  - Add your model API key to the config or set {}",
            assetline_config::API_KEY_ENV
        );
    }
    if config.graphql_token().is_none() {
        println!(
            "  - Add your GraphQL token to the config or set {}",
            assetline_config::GRAPHQL_TOKEN_ENV
        );
    }
    println!("  - Ask a question: assetline ask -m \"Which of my devices run Windows 10?\"");

    Ok(())
}

/// Show status
pub async fn status_command() -> Result<()> {
    let config_path = assetline_config::config_path();

    println!("◆ Assetline Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;
    println!("Model:     {}", config.default_model());
    println!(
        "API Key:   {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("GraphQL:   {}", config.graphql.endpoint);
    println!(
        "Token:     {}",
        if config.graphql_token().is_some() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Max tool rounds: {}", config.max_tool_rounds());

    println!("\n◆ Ready");

    Ok(())
}

/// Print the agent card
pub fn card_command() -> Result<()> {
    let card = AgentCard::asset_management();
    println!("{}", serde_json::to_string_pretty(&card)?);
    Ok(())
}
