//! # Roadwatch Core
//!
//! Domain types, traits, and error definitions for the Roadwatch
//! road-conditions agent. This crate has **no framework dependencies**; it
//! defines the conversation model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the control loop is a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping model providers via configuration
//! - Testing the loop with scripted providers and fixture tools
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{AssistantMessage, ConversationState, MalformedArguments, Message, ToolCallRequest};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolRegistry};
