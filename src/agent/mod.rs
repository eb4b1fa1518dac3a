//! Agent module - The single-thread reasoning/acting loop
//!
//! An [`Agent`] owns one conversation log and turns each user message into
//! a multi-step exchange with a model:
//!
//! - Pacing provider calls to a minimum request interval
//! - Calling the model with the full log and the tool schemas
//! - Running requested tools in parallel and recording their results in
//!   the order the model asked for them
//! - Streaming lifecycle events ([`AgentMessage`]) to the caller
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  stream_request  ┌─────────────┐     ┌─────────────┐
//! │ThreadService │─────────────────>│    Agent    │────>│ LLMProvider │
//! │   (relay)    │<─ AgentMessage ──│  (reAct)    │     │             │
//! └──────────────┘                  └─────────────┘     └─────────────┘
//!                                          │
//!                                          ▼
//!                                   ┌─────────────┐
//!                                   │ToolRegistry │
//!                                   └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use threadloom::agent::{Agent, AgentConfig, AgentDeps, AgentMessage};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn ask(deps: AgentDeps) -> threadloom::Result<()> {
//!     let agent = Arc::new(Agent::new(AgentConfig::new("deepseek-chat", "/work"), deps)?);
//!     let mut rx = agent.stream_request("What is in this project?", &CancellationToken::new())?;
//!     while let Some(event) = rx.recv().await {
//!         if let AgentMessage::FinalResponse { content } = event {
//!             println!("{content}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod context;
mod events;
mod r#loop;
mod stats;

pub use config::AgentConfig;
pub use context::{ContextBuilder, DEFAULT_SYSTEM_PROMPT};
pub use events::AgentMessage;
pub use r#loop::{generate_agent_id, Agent, AgentDeps, FALLBACK_RESPONSE};
pub use stats::AgentStats;
