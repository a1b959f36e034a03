//! `POST /api/chat`: one question in, one answer out.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ApiError, SharedState};

fn default_model_core() -> String {
    "nemotron".into()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub input_question: String,
    pub user_id: String,
    /// Model alias; unknown or unavailable aliases use the default model.
    #[serde(default = "default_model_core")]
    pub llm_model_core: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Accepted for compatibility; conversations are not resumed.
    #[serde(default)]
    pub chat_history: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub bot_answer: String,
    pub identifiers: Identifiers,
    pub answer_details: serde_json::Map<String, serde_json::Value>,
    pub metadata: ChatMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Identifiers {
    pub user_id: String,
    pub conversation_id: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMetadata {
    pub model_used: String,
    pub timestamp: String,
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!(
        user_id = %payload.user_id,
        model = %payload.llm_model_core,
        history = payload.chat_history.len(),
        "Processing chat request"
    );

    let (model_used, engine) = state
        .engine_for(Some(&payload.llm_model_core))
        .ok_or_else(|| crate::internal_error("No model is available".into()))?;
    let model_used = model_used.to_string();

    let conversation = state.answer(&engine, &payload.input_question).await?;

    Ok(Json(ChatResponse {
        bot_answer: conversation.final_answer().unwrap_or_default().to_string(),
        identifiers: Identifiers {
            user_id: payload.user_id,
            conversation_id: payload.conversation_id.unwrap_or_default(),
            model: payload.llm_model_core,
        },
        answer_details: serde_json::Map::new(),
        metadata: ChatMetadata {
            model_used,
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    }))
}
