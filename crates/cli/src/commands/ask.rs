//! `roadwatch ask`: Ask one question and print the answer.

use std::sync::Arc;

use roadwatch_agent::ConversationEngine;
use roadwatch_config::AppConfig;
use roadwatch_core::message::{ConversationState, Message};

pub async fn run(
    question: String,
    model: Option<String>,
    transcript: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let alias = model.unwrap_or_else(|| config.model_core.clone());

    let binding = roadwatch_providers::bind_model(&config, &alias).map_err(|e| {
        format!(
            "Cannot use model '{alias}': {e}\n  Set ROADWATCH_API_KEY or a provider key, \
             or edit {}",
            AppConfig::config_dir().join("config.toml").display()
        )
    })?;

    let tools = Arc::new(roadwatch_tools::default_registry(&config)?);
    let engine = ConversationEngine::from_config(&config, binding, tools)?;

    let state = engine
        .run_conversation(vec![Message::human(question)])
        .await?;

    if transcript {
        for line in render_transcript(&state) {
            println!("{line}");
        }
    } else {
        println!("{}", state.final_answer().unwrap_or_default());
    }

    Ok(())
}

/// One line per message, tool calls listed under their assistant message.
fn render_transcript(state: &ConversationState) -> Vec<String> {
    let mut lines = Vec::new();
    for message in &state.messages {
        match message {
            Message::Assistant(reply) => {
                if !reply.content.is_empty() {
                    lines.push(format!("[assistant] {}", reply.content));
                }
                for call in &reply.tool_calls {
                    lines.push(format!(
                        "[assistant] -> {}({}) id={}",
                        call.name,
                        call.arguments_json(),
                        call.id
                    ));
                }
            }
            Message::Tool {
                tool_call_id,
                content,
            } => lines.push(format!("[tool {tool_call_id}] {content}")),
            other => lines.push(format!("[{}] {}", other.role(), other.content())),
        }
    }
    lines
}
