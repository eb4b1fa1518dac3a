//! Threadloom CLI
//!
//! Interactive chat over persisted threads plus a few thread and model
//! management commands.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use threadloom::agent::{AgentDeps, AgentMessage};
use threadloom::config::Config;
use threadloom::providers::ModelRegistry;
use threadloom::service::ThreadService;
use threadloom::session::Role;
use threadloom::store::FileThreadStore;
use threadloom::tools::ToolRegistry;
use threadloom::workspace::Workspaces;

#[derive(Parser)]
#[command(name = "threadloom", version, about = "Multi-thread conversational agent")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat in a thread (a new one unless --thread is given)
    Chat {
        #[arg(long)]
        thread: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Manage stored threads
    Threads {
        #[command(subcommand)]
        action: ThreadsAction,
    },
    /// Manage known workspaces
    Workspaces {
        #[command(subcommand)]
        action: WorkspacesAction,
    },
    /// List available models
    Models,
}

#[derive(Subcommand)]
enum WorkspacesAction {
    List,
    Add { path: String },
    Remove { path: String },
}

#[derive(Subcommand)]
enum ThreadsAction {
    List,
    Delete { id: String },
    Rename { id: String, title: String },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn build_service(config: &Config) -> Result<ThreadService> {
    let workspaces = Workspaces::from_config(&config.workspaces);
    if workspaces.default_workspace().is_none() {
        let cwd = std::env::current_dir().context("failed to read current directory")?;
        workspaces
            .add(cwd)
            .context("failed to register current directory as workspace")?;
    }

    let deps = AgentDeps {
        models: Arc::new(ModelRegistry::builtin(config)),
        tools: Arc::new(ToolRegistry::with_defaults()),
        workspaces: Arc::new(workspaces),
    };
    let store = FileThreadStore::with_path(config.storage_path())
        .context("failed to open thread storage")?;
    info!(path = %store.path().display(), "Using thread storage");

    let service = ThreadService::load(Arc::new(store), deps, config.agents.clone())
        .await
        .context("failed to load threads")?;
    Ok(service)
}

fn format_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn render(event: &AgentMessage) {
    match event {
        AgentMessage::StartThinking => eprintln!("· thinking"),
        AgentMessage::Thought { content } => eprintln!("· {}", content.trim()),
        AgentMessage::ExecutingToolStart { id, name, args } => {
            eprintln!("→ [{}] {} {}", id, name, args)
        }
        AgentMessage::ExecutingToolFinish { id, name, content, .. } => {
            eprintln!("← [{}] {} ({} lines)", id, name, content.lines().count())
        }
        AgentMessage::FinalResponse { content } => println!("\n{}\n", content),
        AgentMessage::Error { message } => eprintln!("error: {}", message),
    }
}

/// Print events until the turn ends; Ctrl-C cancels the turn.
async fn drain(
    service: &ThreadService,
    thread_id: &str,
    mut rx: mpsc::Receiver<AgentMessage>,
) -> Result<()> {
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => render(&event),
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                debug!(thread_id, "Interrupt received");
                service.cancel_stream_request_to_thread(thread_id).await?;
            }
        }
    }
}

async fn print_history(service: &ThreadService, thread_id: &str) -> Result<()> {
    for (index, message) in service
        .get_thread_messages(thread_id)
        .await?
        .iter()
        .enumerate()
    {
        if message.role == Role::Tool {
            println!("[{}] tool: ({} lines)", index, message.content.lines().count());
        } else {
            println!("[{}] {}: {}", index, message.role, message.content);
        }
    }
    Ok(())
}

async fn chat(service: &ThreadService, thread: Option<String>, model: Option<String>) -> Result<()> {
    let thread_id = match thread {
        Some(id) => service.get_thread(&id).await?.id,
        None => service.create_thread().await?,
    };
    if let Some(model) = model {
        service.update_thread_model(&thread_id, &model).await?;
    }

    let info = service.get_thread(&thread_id).await?;
    println!("Thread {} ({}) in {}", info.id, info.model, info.work_dir);
    println!("Commands: /edit <index> <text>, /regen, /history, /quit\n");

    let mut editor = DefaultEditor::new().context("failed to start line editor")?;
    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        let stream = match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) | ("/exit", _) => break,
            ("/history", _) => {
                print_history(service, &thread_id).await?;
                continue;
            }
            ("/regen", _) => service.regenerate_last_response_to_thread(&thread_id).await,
            ("/edit", rest) => {
                let Some((index, text)) = rest.trim().split_once(' ') else {
                    eprintln!("usage: /edit <index> <text>");
                    continue;
                };
                let Ok(index) = index.parse::<usize>() else {
                    eprintln!("invalid index: {}", index);
                    continue;
                };
                service
                    .edit_and_resend_request_to_thread(&thread_id, index, text)
                    .await
            }
            _ => service.stream_request_to_thread(&thread_id, line).await,
        };

        match stream {
            Ok(rx) => drain(service, &thread_id, rx).await?,
            Err(e) => eprintln!("error: {}", e),
        }
        std::io::stdout().flush().ok();
    }
    Ok(())
}

async fn run(cli: Cli, service: &ThreadService) -> Result<()> {
    match cli.command {
        Commands::Chat { thread, model } => chat(service, thread, model).await?,
        Commands::Threads { action } => match action {
            ThreadsAction::List => {
                let threads = service.list_threads().await;
                if threads.is_empty() {
                    println!("No threads yet.");
                }
                for t in threads {
                    println!(
                        "{}  {:<14}  {:<24}  {}",
                        t.id,
                        t.title,
                        t.model,
                        format_time(t.updated_at)
                    );
                }
            }
            ThreadsAction::Delete { id } => {
                service.delete_thread(&id).await?;
                println!("Deleted {}", id);
            }
            ThreadsAction::Rename { id, title } => {
                service.update_thread_title(&id, &title).await?;
                println!("Renamed {}", id);
            }
        },
        Commands::Workspaces { action } => match action {
            WorkspacesAction::List => {
                for w in service.list_workspaces() {
                    let marker = if w.is_default { "*" } else { " " };
                    println!("{} {}", marker, w.path.display());
                }
            }
            WorkspacesAction::Add { path } => {
                service.add_workspace(&path).await?;
                println!("Added {}", path);
            }
            WorkspacesAction::Remove { path } => {
                service.delete_workspace(&path).await?;
                println!("Removed {}", path);
            }
        },
        Commands::Models => {
            let default = service.default_model();
            for m in service.list_models() {
                let marker = if m.id == default { "*" } else { " " };
                println!(
                    "{} {:<28} {:<18} {:<10} {}",
                    marker, m.id, m.name, m.provider, m.context_window
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = Config::load().context("failed to load configuration")?;
    let service = build_service(&config).await?;

    let outcome = run(cli, &service).await;
    service.shutdown().await;
    outcome
}
