//! # TrialScout Core
//!
//! Domain types, traits, and error definitions shared by every TrialScout
//! crate. Nothing in here talks to the network or the filesystem; it defines
//! the model the other crates implement against.
//!
//! ## Seams
//!
//! - [`Provider`] - the reasoning (chat completion) function
//! - [`Embedder`] - the embedding function
//! - [`Tool`] - a named capability the answering agent may invoke
//!
//! Tests swap each seam for a deterministic stand-in.

pub mod agent;
pub mod embedding;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod study;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentPhase, AgentStep, ToolInvocation};
pub use embedding::Embedder;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use study::StudyRecord;
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
