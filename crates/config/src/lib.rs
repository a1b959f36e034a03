//! Configuration loading, validation, and management for Roadwatch.
//!
//! Loads configuration from `~/.roadwatch/config.toml` (or the file named by
//! `ROADWATCH_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

pub mod catalog;
pub mod prompts;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use catalog::ModelConfig;
pub use prompts::{CHAIN_REFLECTION, CHAIN_ROUTES_AGENT, PROMPT_REFLECTION, PROMPT_ROUTES_AGENT};

/// The root configuration structure.
///
/// Maps directly to `~/.roadwatch/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key shared by every provider without its own key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model alias to run (key into the model catalog)
    #[serde(default = "default_model_core")]
    pub model_core: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Extra or overriding model aliases
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Control-loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Prompt texts keyed by lookup key (e.g. `routes_agent.default`)
    #[serde(default)]
    pub prompts: HashMap<String, String>,

    /// Source of the daily road report
    #[serde(default)]
    pub route_report: RouteReportConfig,
}

fn default_model_core() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.5
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model_core", &self.model_core)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("models", &self.models)
            .field("providers", &self.providers)
            .field("gateway", &self.gateway)
            .field("agent", &self.agent)
            .field("prompts", &self.prompts.keys().collect::<Vec<_>>())
            .field("route_report", &self.route_report)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// CORS origins; `["*"]` allows any origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Public URL advertised in the agent card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Agent name, used as the last prompt fallback (`agent_<suffix>`)
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// System message seeded into every gateway request
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Upper bound on tool/reflection cycles; unset means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reflection_cycles: Option<u32>,

    /// Cancel a conversation that runs longer than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

fn default_agent_name() -> String {
    "agent_rutas".into()
}
fn default_greeting() -> String {
    "You are an assistant specialized in reporting the status of the roads \
     of the province of Neuquén."
        .into()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            greeting: default_greeting(),
            max_reflection_cycles: None,
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteReportConfig {
    #[serde(default = "default_report_url")]
    pub url: String,

    #[serde(default = "default_report_timeout")]
    pub timeout_secs: u64,
}

fn default_report_url() -> String {
    "https://w2.dpvneuquen.gov.ar/ParteDiario.pdf".into()
}
fn default_report_timeout() -> u64 {
    30
}

impl Default for RouteReportConfig {
    fn default() -> Self {
        Self {
            url: default_report_url(),
            timeout_secs: default_report_timeout(),
        }
    }
}

/// Environment variables consulted for a provider's API key.
fn provider_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "google" => Some("GOOGLE_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        _ => None,
    }
}

impl AppConfig {
    /// Load configuration from `ROADWATCH_CONFIG` or the default path.
    ///
    /// Environment overrides:
    /// - `ROADWATCH_API_KEY` replaces the shared key
    /// - `OPENAI_API_KEY`, `GOOGLE_API_KEY`, `OPENROUTER_API_KEY` fill a
    ///   provider's key when its config section sets none
    /// - `MODEL_CORE` (model alias)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("ROADWATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;

        if let Ok(key) = std::env::var("ROADWATCH_API_KEY") {
            config.api_key = Some(key);
        }

        for provider in ["openai", "google", "openrouter"] {
            let entry = config.providers.entry(provider.to_string()).or_default();
            if entry.api_key.is_none() {
                entry.api_key = provider_key_env(provider).and_then(|var| std::env::var(var).ok());
            }
        }

        if let Ok(model_core) = std::env::var("MODEL_CORE") {
            config.model_core = model_core;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".roadwatch")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.port must be non-zero".into(),
            ));
        }

        if self.agent.max_reflection_cycles == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.max_reflection_cycles must be at least 1 when set".into(),
            ));
        }

        if self.agent.request_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.request_timeout_secs must be at least 1 when set".into(),
            ));
        }

        Ok(())
    }

    /// Look up a model alias, configured entries first, then the built-in catalog.
    pub fn model(&self, alias: &str) -> Result<ModelConfig, ConfigError> {
        self.models
            .get(alias)
            .cloned()
            .or_else(|| catalog::builtin(alias))
            .ok_or_else(|| ConfigError::UnknownModel(alias.to_string()))
    }

    /// Every known model alias, sorted.
    pub fn model_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = catalog::builtin_aliases()
            .iter()
            .map(|s| s.to_string())
            .chain(self.models.keys().cloned())
            .collect();
        aliases.sort();
        aliases.dedup();
        aliases
    }

    /// API key for a provider: its own key, else the shared key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Resolve a prompt for `(chain, model_core, agent_name)`.
    ///
    /// Keys are tried in the order given by [`prompts::lookup_keys`];
    /// configured prompts shadow the built-in ones.
    pub fn resolve_prompt(
        &self,
        chain: &str,
        model_core: &str,
        agent_name: &str,
    ) -> Result<String, ConfigError> {
        let keys = prompts::lookup_keys(chain, model_core, agent_name);
        for key in &keys {
            if let Some(text) = self.prompts.get(key) {
                tracing::debug!(key = %key, "Loaded configured prompt");
                return Ok(text.clone());
            }
            if let Some(text) = prompts::builtin(key) {
                tracing::debug!(key = %key, "Loaded built-in prompt");
                return Ok(text.to_string());
            }
        }
        tracing::error!(chain, model_core, tried = ?keys, "No prompt matched");
        Err(ConfigError::PromptNotFound {
            chain: chain.to_string(),
            tried: keys,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model_core: default_model_core(),
            temperature: default_temperature(),
            max_tokens: None,
            models: HashMap::new(),
            providers: HashMap::new(),
            gateway: GatewayConfig::default(),
            agent: AgentSettings::default(),
            prompts: HashMap::new(),
            route_report: RouteReportConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown model alias: {0}")]
    UnknownModel(String),

    #[error("No prompt found for chain '{chain}' (tried: {})", tried.join(", "))]
    PromptNotFound { chain: String, tried: Vec<String> },
}
