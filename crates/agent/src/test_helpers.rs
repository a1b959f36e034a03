//! Shared test helpers for engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roadwatch_core::error::{ProviderError, ToolError};
use roadwatch_core::message::{AssistantMessage, ToolCallRequest};
use roadwatch_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use roadwatch_core::tool::{Tool, ToolRegistry};
use roadwatch_providers::ModelBinding;
use tokio_util::sync::CancellationToken;

use crate::engine::{ConversationEngine, Prompts};

pub const PRIMARY: &str = "primary instruction";
pub const REFLECTION: &str = "reflection instruction";

/// A mock provider that returns a sequence of scripted results.
///
/// Each call to `complete` returns the next result in the queue and records
/// the request. Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    results: Vec<Result<ProviderResponse, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            results,
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        match self.results.get(index) {
            Some(result) => result.clone(),
            None => panic!(
                "SequentialMockProvider: no more responses (call #{index}, have {})",
                self.results.len()
            ),
        }
    }
}

fn response(message: AssistantMessage) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a simple text response (no tool calls).
pub fn text_response(text: &str) -> ProviderResponse {
    response(AssistantMessage::text(text))
}

pub fn tool_call_response(calls: Vec<ToolCallRequest>) -> ProviderResponse {
    tool_call_response_with_text(calls, "")
}

pub fn tool_call_response_with_text(calls: Vec<ToolCallRequest>, text: &str) -> ProviderResponse {
    response(AssistantMessage::with_tool_calls(text, calls))
}

pub fn call(id: &str, name: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, name, serde_json::Map::new())
}

pub fn route_call(id: &str, query: &str) -> ToolCallRequest {
    let mut args = serde_json::Map::new();
    args.insert("query".into(), serde_json::json!(query));
    ToolCallRequest::new(id, "buscar_estado_rutas", args)
}

/// A tool that returns fixed text and counts its invocations.
pub struct CountingTool {
    name: String,
    output: String,
    calls: AtomicUsize,
    cancels: Option<CancellationToken>,
}

impl CountingTool {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            calls: AtomicUsize::new(0),
            cancels: None,
        }
    }

    /// Cancel `token` from inside every execution.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancels = Some(token);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Returns a fixed answer"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }

    async fn execute(
        &self,
        _arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancels {
            token.cancel();
        }
        Ok(self.output.clone())
    }
}

/// Lets a test keep a handle on a tool owned by the registry.
struct SharedTool(Arc<CountingTool>);

#[async_trait::async_trait]
impl Tool for SharedTool {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn description(&self) -> &str {
        self.0.description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.0.parameters_schema()
    }

    async fn execute(
        &self,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ToolError> {
        self.0.execute(arguments).await
    }
}

pub fn registry_with(tool: Arc<CountingTool>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SharedTool(tool))).unwrap();
    Arc::new(registry)
}

pub fn engine_with(provider: Arc<SequentialMockProvider>, tools: Arc<ToolRegistry>) -> ConversationEngine {
    let prompts = Prompts {
        primary: PRIMARY.into(),
        reflection: REFLECTION.into(),
    };
    ConversationEngine::new(ModelBinding::new("mock", provider, "mock-model"), tools, prompts)
}
