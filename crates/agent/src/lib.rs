//! The conversation control loop for Roadwatch.
//!
//! A conversation moves through a small graph of nodes:
//!
//! 1. **llm_call**: the model sees the history under the primary instruction
//! 2. **tools**: every tool call of the last reply is dispatched, in order
//! 3. **reflection**: the model sees the tool results under the reflection
//!    instruction and either asks for more tools or answers
//!
//! The loop ends as soon as a model reply carries no tool calls. Each node
//! returns only the messages it adds; the engine merges them with
//! `roadwatch_core::message::append`.

pub mod engine;
pub mod graph;

#[cfg(test)]
mod test_helpers;

pub use engine::{ConversationEngine, GUARD_NOTICE, Prompts};
pub use graph::Node;
