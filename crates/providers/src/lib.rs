//! Language-model provider implementations for Roadwatch.
//!
//! All providers implement the `roadwatch_core::Provider` trait.
//! The router turns a model alias from the configuration into a provider
//! plus the model id to request.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ModelBinding, bind_model};
