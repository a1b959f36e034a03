//! Tool trait and registry: the agent's capabilities and their dispatch.
//!
//! Tools are registered once at start-up, then the registry is frozen behind
//! an `Arc` and shared read-only by every in-flight conversation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::event::{DomainEvent, EventBus};
use crate::message::{Message, ToolCallRequest};
use crate::provider::ToolDefinition;

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "buscar_estado_rutas").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments, returning the text the
    /// model will see.
    async fn execute(
        &self,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, keyed by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            event_bus: None,
        }
    }

    /// Publish a `ToolExecuted` event for every dispatched call.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> std::result::Result<&dyn Tool, ToolError> {
        self.tools
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// All tool definitions, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute every request in emission order and return one tool result
    /// per request, carrying the request's id.
    ///
    /// Missing tools and failing tools become result content; one bad call
    /// never aborts its siblings. Nothing is retried.
    pub async fn dispatch_all(&self, requests: &[ToolCallRequest]) -> Vec<Message> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.dispatch(request).await);
        }
        results
    }

    async fn dispatch(&self, request: &ToolCallRequest) -> Message {
        let tool = match self.resolve(&request.name) {
            Ok(tool) => tool,
            Err(_) => {
                warn!(tool = %request.name, call_id = %request.id, "Model requested an unknown tool");
                self.publish(&request.name, false, 0);
                return Message::tool_result(
                    &request.id,
                    format!("Tool '{}' not found.", request.name),
                );
            }
        };

        if let Some(malformed) = &request.malformed {
            warn!(tool = %request.name, call_id = %request.id, error = %malformed.error, "Malformed tool arguments");
            self.publish(&request.name, false, 0);
            let e = ToolError::InvalidArguments(malformed.error.clone());
            return Message::tool_result(&request.id, format!("Error: {e}"));
        }

        let start = Instant::now();
        let outcome = tool.execute(&request.arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                debug!(tool = %request.name, duration_ms, "Tool executed");
                self.publish(&request.name, true, duration_ms);
                Message::tool_result(&request.id, output)
            }
            Err(e) => {
                warn!(tool = %request.name, error = %e, "Tool execution failed");
                self.publish(&request.name, false, duration_ms);
                // Report error to the LLM so it can recover
                Message::tool_result(&request.id, format!("Error: {e}"))
            }
        }
    }

    fn publish(&self, tool_name: &str, success: bool, duration_ms: u64) {
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolExecuted {
                tool_name: tool_name.to_string(),
                success,
                duration_ms,
                timestamp: Utc::now(),
            });
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
