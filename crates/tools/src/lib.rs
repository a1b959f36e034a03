//! Built-in tool implementations for Roadwatch.
//!
//! The agent ships with a single tool, `buscar_estado_rutas`, which reads
//! the daily road report published by the DPV Neuquén.

pub mod report;
pub mod route_status;

use std::sync::Arc;

use roadwatch_config::AppConfig;
use roadwatch_core::error::ToolError;
use roadwatch_core::tool::ToolRegistry;

pub use route_status::{HttpPdfSource, ReportSource, RouteStatusTool};

/// Create the default tool registry, reading the report over HTTP.
pub fn default_registry(config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let source = HttpPdfSource::new(&config.route_report)?;
    registry_with_source(Arc::new(source))
}

/// Create a registry whose route tool reads from `source`.
pub fn registry_with_source(source: Arc<dyn ReportSource>) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RouteStatusTool::new(source)))?;
    Ok(registry)
}
