//! Threadloom - Multi-thread conversational agent engine
//!
//! Threadloom keeps many independent conversation threads, each driven by
//! its own reasoning/acting agent that can call tools in a working
//! directory. Turns stream lifecycle events to the caller and every thread
//! is written through to durable storage.
//!
//! # Modules
//!
//! - [`agent`]: the per-thread reAct loop
//! - [`service`]: thread registry, relay, titles and persistence hooks
//! - [`session`]: messages, conversation log, thread metadata
//! - [`store`]: persistence adapters
//! - [`providers`]: model registry and OpenAI-compatible client
//! - [`tools`]: tool trait, registry and the read-only shell tool
//! - [`config`], [`workspace`], [`error`]

pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod service;
pub mod session;
pub mod store;
pub mod tools;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentConfig, AgentDeps, AgentMessage};
pub use config::Config;
pub use error::{LoomError, Result};
pub use providers::{LLMProvider, LLMResponse, ModelInfo, ModelRegistry};
pub use service::{ThreadEvent, ThreadService};
pub use session::{Message, Role, ThreadInfo, ThreadMessage};
pub use store::{FileThreadStore, MemoryThreadStore, ThreadRecord, ThreadStore};
pub use tools::{Tool, ToolContext, ToolRegistry};
pub use workspace::{WorkspaceInfo, Workspaces};
