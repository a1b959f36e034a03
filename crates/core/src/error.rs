//! Error types for the Roadwatch domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Recoverable tool failures never reach the top-level [`Error`]: the
//! registry folds them into the conversation as tool results.

use thiserror::Error;

/// The top-level error type for a conversation run.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors (terminal for the request) ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Engine invariant broken ---
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    // --- Request cancelled or timed out ---
    #[error("Conversation cancelled before completion")]
    Cancelled,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
