//! The conversation engine: runs the graph in [`crate::graph`] over a
//! [`ConversationState`] until the model stops asking for tools.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use roadwatch_config::{AppConfig, CHAIN_REFLECTION, CHAIN_ROUTES_AGENT, ConfigError};
use roadwatch_core::error::{Error, Result};
use roadwatch_core::event::{DomainEvent, EventBus};
use roadwatch_core::message::{AssistantMessage, ConversationState, Message};
use roadwatch_core::provider::{Provider, ProviderRequest};
use roadwatch_core::tool::ToolRegistry;
use roadwatch_providers::ModelBinding;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::graph::Node;

/// Appended when the reflection guard stops a conversation and the model
/// never produced any text.
pub const GUARD_NOTICE: &str =
    "I could not finish looking up the road status within the allowed number of steps.";

/// The two instructions the engine alternates between.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompts {
    pub primary: String,
    pub reflection: String,
}

impl Prompts {
    /// Resolve both prompts for `model_core`, failing if either is missing.
    pub fn resolve(config: &AppConfig, model_core: &str) -> std::result::Result<Self, ConfigError> {
        let agent = &config.agent.name;
        Ok(Self {
            primary: config.resolve_prompt(CHAIN_ROUTES_AGENT, model_core, agent)?,
            reflection: config.resolve_prompt(CHAIN_REFLECTION, model_core, agent)?,
        })
    }
}

/// Runs one conversation at a time; cheap to share behind an `Arc`.
pub struct ConversationEngine {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry, shared read-only
    tools: Arc<ToolRegistry>,

    prompts: Prompts,

    /// Upper bound on `tools` node entries; unbounded when `None`
    max_reflection_cycles: Option<u32>,

    /// Cancel the conversation after this long
    request_timeout: Option<Duration>,

    event_bus: Option<Arc<EventBus>>,
}

impl ConversationEngine {
    /// Create a new engine.
    pub fn new(binding: ModelBinding, tools: Arc<ToolRegistry>, prompts: Prompts) -> Self {
        Self {
            provider: binding.provider,
            model: binding.model,
            temperature: 0.5,
            max_tokens: None,
            tools,
            prompts,
            max_reflection_cycles: None,
            request_timeout: None,
            event_bus: None,
        }
    }

    /// Create an engine with sampling, guard and timeout taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        binding: ModelBinding,
        tools: Arc<ToolRegistry>,
    ) -> std::result::Result<Self, ConfigError> {
        let prompts = Prompts::resolve(config, &binding.alias)?;
        let mut engine = Self::new(binding, tools, prompts).with_temperature(config.temperature);
        if let Some(max) = config.max_tokens {
            engine = engine.with_max_tokens(max);
        }
        if let Some(max) = config.agent.max_reflection_cycles {
            engine = engine.with_max_reflection_cycles(max);
        }
        if let Some(secs) = config.agent.request_timeout_secs {
            engine = engine.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(engine)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Stop after `max` entries into the `tools` node.
    pub fn with_max_reflection_cycles(mut self, max: u32) -> Self {
        self.max_reflection_cycles = Some(max);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a conversation to completion, honoring the configured timeout.
    pub async fn run_conversation(&self, initial: Vec<Message>) -> Result<ConversationState> {
        let token = CancellationToken::new();
        let timer = self.request_timeout.map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                token.cancel();
            })
        });

        let result = self.run_with_cancellation(initial, &token).await;

        if let Some(timer) = timer {
            timer.abort();
        }
        result
    }

    /// Run a conversation until it ends or `token` is cancelled.
    pub async fn run_with_cancellation(
        &self,
        initial: Vec<Message>,
        token: &CancellationToken,
    ) -> Result<ConversationState> {
        let result = self.drive(ConversationState::new(initial), token).await;
        if let Err(e) = &result {
            error!(error = %e, model = %self.model, "Conversation failed");
            self.publish(DomainEvent::ErrorOccurred {
                context: "conversation".into(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
        }
        result
    }

    async fn drive(
        &self,
        mut state: ConversationState,
        token: &CancellationToken,
    ) -> Result<ConversationState> {
        state.validate()?;

        let mut node = Node::START;
        let mut tools_entries: u32 = 0;

        loop {
            if node == Node::End {
                info!(messages = state.len(), "Conversation finished");
                return Ok(state);
            }

            if token.is_cancelled() {
                warn!(node = %node, "Conversation cancelled");
                return Err(Error::Cancelled);
            }

            if node == Node::Tools {
                if let Some(max) = self.max_reflection_cycles {
                    if tools_entries >= max {
                        warn!(max, "Reflection limit reached, ending conversation");
                        state = state.append(&[best_effort_answer(&state)]);
                        node = Node::End;
                        continue;
                    }
                }
                tools_entries += 1;
            }

            debug!(node = %node, messages = state.len(), "Entering node");
            self.publish(DomainEvent::NodeEntered {
                node: node.as_str().to_string(),
                messages: state.len(),
                timestamp: Utc::now(),
            });

            let update = match node {
                Node::LlmCall => {
                    self.call_model(&state, &self.prompts.primary, token)
                        .await?
                }
                Node::Reflection => {
                    self.call_model(&state, &self.prompts.reflection, token)
                        .await?
                }
                Node::Tools => self.run_tools(&state).await?,
                Node::End => Vec::new(),
            };

            state = state.append(&update);
            node = node.next(state.last());
        }
    }

    /// One model turn over the whole history under `prompt`.
    async fn call_model(
        &self,
        state: &ConversationState,
        prompt: &str,
        token: &CancellationToken,
    ) -> Result<Vec<Message>> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: state.with_system_prompt(prompt),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions(),
        };

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            response = self.provider.complete(request) => response?,
        };

        let tool_calls = response.message.tool_calls.len();
        debug!(
            model = %response.model,
            tool_calls,
            tokens = response.usage.map(|u| u.total_tokens),
            "Model replied"
        );
        self.publish(DomainEvent::ResponseGenerated {
            model: response.model.clone(),
            tool_calls,
            tokens_used: response.usage.map(|u| u.total_tokens),
            timestamp: Utc::now(),
        });

        Ok(vec![Message::Assistant(response.message)])
    }

    /// Dispatch the tool calls of the last assistant reply.
    async fn run_tools(&self, state: &ConversationState) -> Result<Vec<Message>> {
        match state.last() {
            Some(Message::Assistant(reply)) => Ok(self.tools.dispatch_all(&reply.tool_calls).await),
            Some(other) => Err(Error::ProtocolViolation(format!(
                "tools node expects an assistant message last, found {}",
                other.role()
            ))),
            None => Err(Error::ProtocolViolation(
                "tools node reached with an empty conversation".into(),
            )),
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

/// Final reply used when the reflection guard trips.
fn best_effort_answer(state: &ConversationState) -> Message {
    let content = state
        .final_answer()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(GUARD_NOTICE);
    Message::Assistant(AssistantMessage::text(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use roadwatch_core::error::ProviderError;
    use roadwatch_core::message::ToolCallRequest;

    fn p013_engine(provider: Arc<SequentialMockProvider>) -> (ConversationEngine, Arc<CountingTool>) {
        let tool = Arc::new(CountingTool::new("buscar_estado_rutas", "P013: closed"));
        let engine = engine_with(provider, registry_with(tool.clone()));
        (engine, tool)
    }

    #[tokio::test]
    async fn route_p013_scenario() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_call_response(vec![route_call("call_1", "P013")]),
            text_response("Route P013 is closed."),
        ]));
        let (engine, tool) = p013_engine(provider.clone());

        let state = engine
            .run_conversation(vec![Message::human("status of route P013")])
            .await
            .unwrap();

        assert_eq!(state.len(), 4);
        assert_eq!(state.final_answer(), Some("Route P013 is closed."));
        assert_eq!(state.messages[2], Message::tool_result("call_1", "P013: closed"));
        assert_eq!(tool.calls(), 1);
        assert_eq!(provider.call_count(), 2);

        let requests = provider.requests();
        assert_eq!(requests[0].messages[0], Message::system(PRIMARY));
        assert_eq!(requests[1].messages[0], Message::system(REFLECTION));
        assert_eq!(requests[1].messages.len(), 4);
        assert_eq!(requests[0].tools.len(), 1);
        assert!(state.validate().is_ok());
    }

    #[tokio::test]
    async fn direct_answer_ends_after_one_call() {
        let provider = Arc::new(SequentialMockProvider::new(vec![text_response("Hello")]));
        let (engine, tool) = p013_engine(provider.clone());

        let state = engine
            .run_conversation(vec![Message::human("hi")])
            .await
            .unwrap();

        assert_eq!(state.len(), 2);
        assert_eq!(state.final_answer(), Some("Hello"));
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn greeting_stays_in_state_but_not_in_request() {
        let provider = Arc::new(SequentialMockProvider::new(vec![text_response("ok")]));
        let (engine, _) = p013_engine(provider.clone());

        let state = engine
            .run_conversation(vec![Message::system("greeting"), Message::human("hi")])
            .await
            .unwrap();

        assert_eq!(state.messages[0], Message::system("greeting"));
        let sent = &provider.requests()[0].messages;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], Message::system(PRIMARY));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_and_loop_continues() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_call_response(vec![call("call_x", "unknown_tool")]),
            text_response("Sorry, I cannot do that."),
        ]));
        let (engine, _) = p013_engine(provider.clone());

        let state = engine
            .run_conversation(vec![Message::human("do something")])
            .await
            .unwrap();

        assert_eq!(
            state.messages[2],
            Message::tool_result("call_x", "Tool 'unknown_tool' not found.")
        );
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.requests()[1].messages[0], Message::system(REFLECTION));
    }

    #[tokio::test]
    async fn provider_failure_on_first_call_aborts() {
        let provider = Arc::new(SequentialMockProvider::with_results(vec![Err(
            ProviderError::Network("connection refused".into()),
        )]));
        let (engine, tool) = p013_engine(provider.clone());

        let err = engine
            .run_conversation(vec![Message::human("status of route P013")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider(ProviderError::Network(_))));
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn several_cycles_until_model_stops() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_call_response(vec![route_call("c1", "rutas disponibles")]),
            tool_call_response(vec![route_call("c2", "P013")]),
            tool_call_response(vec![route_call("c3", "P014")]),
            text_response("Both are closed."),
        ]));
        let (engine, tool) = p013_engine(provider.clone());

        let state = engine
            .run_conversation(vec![Message::human("P013 and P014?")])
            .await
            .unwrap();

        assert_eq!(tool.calls(), 3);
        assert_eq!(provider.call_count(), 4);
        assert_eq!(state.len(), 8);
        assert!(state.pending_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn tool_calls_within_a_turn_keep_order() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_call_response(vec![
                route_call("a", "P013"),
                call("b", "missing"),
                route_call("c", "P014"),
            ]),
            text_response("done"),
        ]));
        let (engine, _) = p013_engine(provider);

        let state = engine
            .run_conversation(vec![Message::human("q")])
            .await
            .unwrap();

        let ids: Vec<&str> = state.messages[2..5]
            .iter()
            .map(|m| match m {
                Message::Tool { tool_call_id, .. } => tool_call_id.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn reflection_guard_ends_with_best_effort_answer() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_call_response(vec![route_call("c1", "P013")]),
            tool_call_response_with_text(vec![route_call("c2", "P013")], "Still checking P013"),
        ]));
        let (engine, tool) = p013_engine(provider.clone());
        let engine = engine.with_max_reflection_cycles(1);

        let state = engine
            .run_conversation(vec![Message::human("P013?")])
            .await
            .unwrap();

        assert_eq!(tool.calls(), 1);
        assert_eq!(provider.call_count(), 2);
        let last = state.last_assistant().unwrap();
        assert!(last.tool_calls.is_empty());
        assert_eq!(last.content, "Still checking P013");
    }

    #[tokio::test]
    async fn reflection_guard_falls_back_to_notice() {
        let provider = Arc::new(SequentialMockProvider::new(vec![tool_call_response(vec![
            route_call("c1", "P013"),
        ])]));
        let (engine, tool) = p013_engine(provider);
        let engine = engine.with_max_reflection_cycles(0);

        let state = engine
            .run_conversation(vec![Message::human("P013?")])
            .await
            .unwrap();

        assert_eq!(tool.calls(), 0);
        assert_eq!(state.final_answer(), Some(GUARD_NOTICE));
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let provider = Arc::new(SequentialMockProvider::new(vec![text_response("unused")]));
        let (engine, _) = p013_engine(provider.clone());
        let token = CancellationToken::new();
        token.cancel();

        let err = engine
            .run_with_cancellation(vec![Message::human("hi")], &token)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn request_timeout_cancels_slow_model() {
        let provider = Arc::new(
            SequentialMockProvider::new(vec![text_response("too late")])
                .with_delay(Duration::from_secs(60)),
        );
        let (engine, _) = p013_engine(provider);
        let engine = engine.with_request_timeout(Duration::from_millis(50));

        let err = engine
            .run_conversation(vec![Message::human("hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn malformed_arguments_are_reported_and_loop_continues() {
        let bad = ToolCallRequest::from_json_arguments("call_m", "buscar_estado_rutas", r#"{"query": "P013""#);
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_call_response_with_text(vec![bad], "Let me check"),
            text_response("Could you repeat the route code?"),
        ]));
        let (engine, tool) = p013_engine(provider.clone());

        let state = engine
            .run_conversation(vec![Message::human("P013?")])
            .await
            .unwrap();

        assert_eq!(state.messages[1].content(), "Let me check");
        match &state.messages[2] {
            Message::Tool {
                tool_call_id,
                content,
            } => {
                assert_eq!(tool_call_id, "call_m");
                assert!(content.starts_with("Error: Invalid tool arguments: "));
            }
            other => panic!("expected a tool result, got {}", other.role()),
        }
        assert_eq!(tool.calls(), 0);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(state.final_answer(), Some("Could you repeat the route code?"));
    }

    #[tokio::test]
    async fn cancel_during_tools_finishes_batch_then_stops() {
        let token = CancellationToken::new();
        let tool = Arc::new(CountingTool::new("buscar_estado_rutas", "P013: closed").cancelling(token.clone()));
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_call_response(vec![route_call("c1", "P013"), route_call("c2", "P014")]),
            text_response("never requested"),
        ]));
        let engine = engine_with(provider.clone(), registry_with(tool.clone()));

        let err = engine
            .run_with_cancellation(vec![Message::human("P013 and P014?")], &token)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(tool.calls(), 2);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn tools_node_requires_assistant_last() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let (engine, tool) = p013_engine(provider);

        let state = ConversationState::new(vec![Message::human("q"), Message::tool_result("x", "out")]);
        let err = engine.run_tools(&state).await.unwrap_err();
        assert!(matches!(&err, Error::ProtocolViolation(msg) if msg.contains("found tool")));

        let err = engine.run_tools(&ConversationState::default()).await.unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn orphan_tool_result_is_protocol_violation() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let (engine, _) = p013_engine(provider.clone());

        let err = engine
            .run_conversation(vec![
                Message::human("hi"),
                Message::tool_result("nobody", "orphan"),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ProtocolViolation(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn events_follow_node_sequence() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let provider = Arc::new(SequentialMockProvider::new(vec![
            tool_call_response(vec![route_call("c1", "P013")]),
            text_response("closed"),
        ]));
        let (engine, _) = p013_engine(provider);
        let engine = engine.with_event_bus(bus);

        engine
            .run_conversation(vec![Message::human("P013?")])
            .await
            .unwrap();

        let mut nodes = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::NodeEntered { node, .. } = event.as_ref() {
                nodes.push(node.clone());
            }
        }
        assert_eq!(nodes, vec!["llm_call", "tools", "reflection"]);
    }

    #[tokio::test]
    async fn failure_publishes_error_event() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let provider = Arc::new(SequentialMockProvider::with_results(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let (engine, _) = p013_engine(provider);
        let engine = engine.with_event_bus(bus);

        assert!(engine.run_conversation(vec![Message::human("hi")]).await.is_err());

        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event.as_ref(), DomainEvent::ErrorOccurred { .. }) {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn prompts_resolve_from_builtin_defaults() {
        let prompts = Prompts::resolve(&AppConfig::default(), "nemotron").unwrap();
        assert_eq!(prompts.primary, roadwatch_config::PROMPT_ROUTES_AGENT);
        assert_eq!(prompts.reflection, roadwatch_config::PROMPT_REFLECTION);
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = AppConfig::default();
        config.temperature = 0.1;
        config.max_tokens = Some(256);
        config.agent.max_reflection_cycles = Some(3);
        config.agent.request_timeout_secs = Some(20);
        config
            .prompts
            .insert("routes_agent.mock".into(), "custom primary".into());

        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let binding = ModelBinding::new("mock", provider, "mock-model");
        let engine =
            ConversationEngine::from_config(&config, binding, Arc::new(ToolRegistry::new())).unwrap();

        assert_eq!(engine.model(), "mock-model");
        assert_eq!(engine.prompts.primary, "custom primary");
        assert_eq!(engine.max_tokens, Some(256));
        assert_eq!(engine.max_reflection_cycles, Some(3));
        assert_eq!(engine.request_timeout, Some(Duration::from_secs(20)));
    }
}
