//! Agent-to-agent (A2A) surface: the agent card and `tasks/send`.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::{ApiError, SharedState};

const INVALID_REQUEST: &str = "Formato de solicitud inválido";

#[derive(Debug, Serialize)]
pub struct AgentCard {
    pub name: &'static str,
    pub description: &'static str,
    pub url: String,
    pub version: &'static str,
    pub capabilities: Capabilities,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub streaming: bool,
    pub push_notifications: bool,
}

pub async fn agent_card_handler(State(state): State<SharedState>) -> Json<AgentCard> {
    let gateway = &state.config.gateway;
    let url = gateway
        .public_url
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", gateway.port));

    Json(AgentCard {
        name: "Artemis AI Chatbot Agent",
        description: "Agent that answers questions about the roads of the province of Neuquén",
        url,
        version: "1.0",
        capabilities: Capabilities {
            streaming: false,
            push_notifications: false,
        },
    })
}

/// Handle an A2A task: the first text part of `message` is the question.
///
/// The reply echoes the task id and the incoming message, followed by the
/// agent's answer.
pub async fn task_send_handler(
    State(state): State<SharedState>,
    Json(task): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let question = task
        .pointer("/message/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| crate::bad_request(INVALID_REQUEST))?;

    let task_id = task.get("id").cloned().unwrap_or(Value::Null);
    info!(task_id = %task_id, "Processing A2A task");

    let (_, engine) = state
        .engine_for(None)
        .ok_or_else(|| crate::internal_error("No model is available".into()))?;
    let conversation = state.answer(&engine, question).await?;
    let answer = conversation.final_answer().unwrap_or_default();

    Ok(Json(json!({
        "id": task_id,
        "status": {"state": "completed"},
        "messages": [
            task.get("message").cloned().unwrap_or_else(|| json!({})),
            {"role": "agent", "parts": [{"text": answer}]}
        ]
    })))
}
