//! Nodes of the conversation graph and the edges between them.
//!
//! ```text
//! start -> llm_call --tool calls--> tools -> reflection --tool calls--> tools
//!             |                                  |
//!             +-----------no tool calls----------+--> end
//! ```

use std::fmt;

use roadwatch_core::message::Message;

/// A node of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// Call the model under the primary instruction.
    LlmCall,
    /// Dispatch the tool calls of the last assistant reply.
    Tools,
    /// Call the model under the reflection instruction.
    Reflection,
    /// Terminal.
    End,
}

impl Node {
    /// Entry node of every conversation.
    pub const START: Node = Node::LlmCall;

    pub fn as_str(self) -> &'static str {
        match self {
            Node::LlmCall => "llm_call",
            Node::Tools => "tools",
            Node::Reflection => "reflection",
            Node::End => "end",
        }
    }

    /// The node to run after `self`, given the last message of the state.
    pub fn next(self, last: Option<&Message>) -> Node {
        let wants_tools = last.is_some_and(|m| !m.tool_calls().is_empty());
        match self {
            Node::LlmCall | Node::Reflection if wants_tools => Node::Tools,
            Node::LlmCall | Node::Reflection => Node::End,
            Node::Tools => Node::Reflection,
            Node::End => Node::End,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
