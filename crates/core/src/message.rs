//! Message and conversation-state domain types.
//!
//! These are the value objects threaded through every node of the control
//! loop: the caller seeds a [`ConversationState`], each node returns new
//! messages, and the engine merges them with [`append`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Error;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation id, unique within a conversation
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON object
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,

    /// Set when the provider sent arguments that are not a JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malformed: Option<MalformedArguments>,
}

/// Argument text a provider sent that could not be decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalformedArguments {
    /// The text exactly as received
    pub raw: String,
    /// Why decoding failed
    pub error: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            malformed: None,
        }
    }

    /// Build a request from the JSON-encoded argument string providers send.
    ///
    /// Blank strings decode to an empty object. Text that is not a JSON
    /// object keeps the call, with empty arguments and the decode error in
    /// [`ToolCallRequest::malformed`].
    pub fn from_json_arguments(id: impl Into<String>, name: impl Into<String>, raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::new(id, name, serde_json::Map::new());
        }
        match serde_json::from_str(raw) {
            Ok(arguments) => Self::new(id, name, arguments),
            Err(e) => Self {
                malformed: Some(MalformedArguments {
                    raw: raw.to_string(),
                    error: e.to_string(),
                }),
                ..Self::new(id, name, serde_json::Map::new())
            },
        }
    }

    /// Arguments as a JSON string; malformed input is returned verbatim.
    pub fn arguments_json(&self) -> String {
        match &self.malformed {
            Some(malformed) => malformed.raw.clone(),
            None => serde_json::Value::Object(self.arguments.clone()).to_string(),
        }
    }
}

/// A single model reply. `content` may be empty when `tool_calls` is not.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantMessage {
    /// A plain text reply with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A reply carrying tool-call requests.
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// One entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Instructions for the model
    System { content: String },

    /// User input
    Human { content: String },

    /// Model reply, optionally requesting tools
    Assistant(AssistantMessage),

    /// Result of one tool call
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(AssistantMessage::text(content))
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// The text content of any variant.
    pub fn content(&self) -> &str {
        match self {
            Self::System { content } | Self::Human { content } => content.as_str(),
            Self::Assistant(reply) => reply.content.as_str(),
            Self::Tool { content, .. } => content.as_str(),
        }
    }

    /// Tool calls carried by this message; empty for every non-assistant variant.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::Assistant(reply) => &reply.tool_calls,
            Self::System { .. } | Self::Human { .. } | Self::Tool { .. } => &[],
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    /// Short role label used in logs and transcripts.
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::Human { .. } => "human",
            Self::Assistant(_) => "assistant",
            Self::Tool { .. } => "tool",
        }
    }
}

impl From<AssistantMessage> for Message {
    fn from(reply: AssistantMessage) -> Self {
        Self::Assistant(reply)
    }
}

/// Return a copy of `messages` whose first entry is `System{prompt}`.
///
/// A leading system message is replaced; otherwise one is prepended.
pub fn with_system_prompt(messages: &[Message], prompt: &str) -> Vec<Message> {
    let rest = match messages.first() {
        Some(Message::System { .. }) => &messages[1..],
        _ => messages,
    };
    let mut out = Vec::with_capacity(rest.len() + 1);
    out.push(Message::system(prompt));
    out.extend_from_slice(rest);
    out
}

/// Order-preserving concatenation, the merge policy applied after every node.
pub fn append(messages: &[Message], new_messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len() + new_messages.len());
    out.extend_from_slice(messages);
    out.extend_from_slice(new_messages);
    out
}

/// The append-only message log of one in-flight request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// `[System, Human]` when a system directive is given, else `[Human]`.
    pub fn from_question(system: Option<&str>, question: impl Into<String>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(Message::system(system));
        }
        messages.push(Message::human(question));
        Self { messages }
    }

    /// Merge a node's update into a new state.
    pub fn append(&self, update: &[Message]) -> Self {
        Self {
            messages: append(&self.messages, update),
        }
    }

    /// The message sequence to send to the model under `prompt`.
    pub fn with_system_prompt(&self, prompt: &str) -> Vec<Message> {
        with_system_prompt(&self.messages, prompt)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The most recent assistant reply, if any.
    pub fn last_assistant(&self) -> Option<&AssistantMessage> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::Assistant(reply) => Some(reply),
            _ => None,
        })
    }

    /// The caller-visible answer: content of the last assistant reply.
    pub fn final_answer(&self) -> Option<&str> {
        self.last_assistant().map(|reply| reply.content.as_str())
    }

    /// Tool calls that no tool result has answered yet, in emission order.
    pub fn pending_tool_calls(&self) -> Vec<&ToolCallRequest> {
        let resolved: HashSet<&str> = self
            .messages
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();

        self.messages
            .iter()
            .flat_map(|m| m.tool_calls())
            .filter(|call| !resolved.contains(call.id.as_str()))
            .collect()
    }

    /// Check tool-call correlation: ids are unique and every tool result
    /// answers exactly one earlier, still unresolved request.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut unresolved: HashSet<&str> = HashSet::new();

        for message in &self.messages {
            match message {
                Message::Assistant(reply) => {
                    for call in &reply.tool_calls {
                        if !seen.insert(call.id.as_str()) {
                            return Err(Error::ProtocolViolation(format!(
                                "duplicate tool call id '{}'",
                                call.id
                            )));
                        }
                        unresolved.insert(call.id.as_str());
                    }
                }
                Message::Tool { tool_call_id, .. } => {
                    if !unresolved.remove(tool_call_id.as_str()) {
                        return Err(Error::ProtocolViolation(format!(
                            "tool result '{tool_call_id}' has no matching unresolved tool call"
                        )));
                    }
                }
                Message::System { .. } | Message::Human { .. } => {}
            }
        }
        Ok(())
    }
}
