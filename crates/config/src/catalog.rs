//! Built-in model catalog: short aliases mapped to a provider and the
//! provider's official model id.

use serde::{Deserialize, Serialize};

/// One model alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider name: "openai", "google", "ollama", "openrouter", ...
    pub provider: String,

    /// Model identifier sent to the provider
    pub model_id: String,

    /// Base URL override for this model only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

// (alias, provider, model_id)
const BUILTIN: &[(&str, &str, &str)] = &[
    // OpenAI
    ("gpt4o", "openai", "gpt-4"),
    ("gpt4omini", "openai", "gpt-4o-mini"),
    ("gpt4", "openai", "gpt-4"),
    ("gpt35", "openai", "gpt-3.5-turbo-0613"),
    ("gpt-4", "openai", "gpt-4"),
    ("gpt-3.5-turbo-0613", "openai", "gpt-3.5-turbo-0613"),
    // Ollama
    ("llama2", "ollama", "llama2"),
    ("llama31", "ollama", "llama3.1"),
    ("nemotron", "ollama", "nemotron"),
    ("deepseek-r1-32b", "ollama", "deepseek-r1:32b"),
    ("mistral", "ollama", "mistral"),
    ("granite3.2", "ollama", "granite3.2"),
    // Google Gemini (OpenAI-compatible endpoint)
    ("gemini-2.0-flash", "google", "gemini-2.0-flash"),
    ("gemini-2.5-flash", "google", "gemini-2.5-flash-preview-04-17"),
    ("gemini-2.5-pro", "google", "gemini-2.5-pro-preview-03-25"),
    ("gemini-1.5-flash", "google", "gemini-1.5-flash"),
    ("gemini-1.5-pro", "google", "gemini-1.5-pro"),
];

/// Look up a built-in alias.
pub fn builtin(alias: &str) -> Option<ModelConfig> {
    BUILTIN
        .iter()
        .find(|(a, _, _)| *a == alias)
        .map(|(_, provider, model_id)| ModelConfig {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            endpoint: None,
        })
}

/// All built-in aliases in declaration order.
pub fn builtin_aliases() -> Vec<&'static str> {
    BUILTIN.iter().map(|(alias, _, _)| *alias).collect()
}
