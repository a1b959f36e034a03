//! Model router: resolves a model alias from the configuration into a
//! ready-to-use provider and the model id it should be asked for.

use std::sync::Arc;

use roadwatch_config::AppConfig;
use roadwatch_core::error::{Error, ProviderError};
use roadwatch_core::provider::Provider;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// A provider bound to one concrete model.
#[derive(Clone)]
pub struct ModelBinding {
    pub alias: String,
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

impl std::fmt::Debug for ModelBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBinding")
            .field("alias", &self.alias)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

impl ModelBinding {
    /// Bind an already constructed provider. Used by tests and embedders.
    pub fn new(alias: impl Into<String>, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            provider,
            model: model.into(),
        }
    }
}

/// Resolve `alias` into a [`ModelBinding`].
///
/// The base URL comes from, in order: the model entry's `endpoint`, the
/// provider section's `api_url`, the well-known default for the provider.
pub fn bind_model(config: &AppConfig, alias: &str) -> Result<ModelBinding, Error> {
    let model = config.model(alias).map_err(|e| Error::Config {
        message: e.to_string(),
    })?;

    let base_url = model
        .endpoint
        .clone()
        .or_else(|| {
            config
                .providers
                .get(&model.provider)
                .and_then(|p| p.api_url.clone())
        })
        .or_else(|| default_base_url(&model.provider).map(str::to_string))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "provider '{}' has no api_url and no known default",
                model.provider
            ))
        })?;

    let api_key = match model.provider.as_str() {
        "ollama" => config
            .api_key_for("ollama")
            .unwrap_or_else(|| "ollama".to_string()),
        other => config.api_key_for(other).ok_or_else(|| {
            ProviderError::NotConfigured(format!("no API key configured for provider '{other}'"))
        })?,
    };

    let provider = OpenAiCompatProvider::new(&model.provider, base_url, api_key)?;
    debug!(
        alias,
        provider = %model.provider,
        model = %model.model_id,
        "Bound model alias"
    );

    Ok(ModelBinding {
        alias: alias.to_string(),
        provider: Arc::new(provider),
        model: model.model_id,
    })
}

/// Default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "google" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        _ => None,
    }
}
