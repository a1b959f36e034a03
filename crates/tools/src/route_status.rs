//! Road status tool: downloads the daily DPV Neuquén report and answers
//! questions about individual routes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roadwatch_config::RouteReportConfig;
use roadwatch_core::error::ToolError;
use roadwatch_core::tool::Tool;
use tracing::{debug, warn};

use crate::report::{answer_query, parse_report};

pub const TOOL_NAME: &str = "buscar_estado_rutas";

/// Where the report text comes from.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Fetch the full report as plain text.
    async fn fetch_text(&self) -> Result<String, ToolError>;
}

/// Downloads the report PDF over HTTP and extracts its text.
pub struct HttpPdfSource {
    url: String,
    client: reqwest::Client,
}

impl HttpPdfSource {
    pub fn new(config: &RouteReportConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| failed(format!("HTTP client: {e}")))?;
        Ok(Self {
            url: config.url.clone(),
            client,
        })
    }
}

#[async_trait]
impl ReportSource for HttpPdfSource {
    async fn fetch_text(&self) -> Result<String, ToolError> {
        debug!(url = %self.url, "Downloading road report");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(format!("Error downloading the report: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| failed(format!("Error downloading the report: {e}")))?;

        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| failed(format!("PDF extraction task failed: {e}")))?
            .map_err(|e| failed(format!("Error reading the PDF: {e}")))
    }
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL_NAME.to_string(),
        reason,
    }
}

/// The `buscar_estado_rutas` tool.
pub struct RouteStatusTool {
    source: Arc<dyn ReportSource>,
}

impl RouteStatusTool {
    pub fn new(source: Arc<dyn ReportSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for RouteStatusTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Look up the current status of the roads of Neuquén from the daily DPV report. \
         Pass a route code (e.g. 'P005'), descriptive terms (e.g. 'neuquén centenario'), \
         or 'rutas disponibles' to list every route."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Route code, place names, or 'rutas disponibles'"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ToolError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let text = self.source.fetch_text().await.inspect_err(|e| {
            warn!(error = %e, "Road report unavailable");
        })?;

        let report = parse_report(&text);
        debug!(query, routes = report.routes.len(), "Answering road query");
        Ok(answer_query(&report, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Result<String, ToolError>);

    #[async_trait]
    impl ReportSource for FixedSource {
        async fn fetch_text(&self) -> Result<String, ToolError> {
            self.0.clone()
        }
    }

    fn tool(text: &str) -> RouteStatusTool {
        RouteStatusTool::new(Arc::new(FixedSource(Ok(text.to_string()))))
    }

    fn args(query: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("query".into(), serde_json::json!(query));
        map
    }

    #[tokio::test]
    async fn answers_code_query() {
        let out = tool("P013 closed by snow\nP014 open")
            .execute(&args("P013"))
            .await
            .unwrap();
        assert!(out.contains("Información para la ruta P013:\nP013 closed by snow"));
    }

    #[tokio::test]
    async fn missing_query_is_invalid() {
        let err = tool("").execute(&serde_json::Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn source_failure_propagates() {
        let source = FixedSource(Err(failed("Error downloading the report: 503".into())));
        let err = RouteStatusTool::new(Arc::new(source))
            .execute(&args("P013"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn definition_requires_query() {
        let def = tool("").to_definition();
        assert_eq!(def.name, "buscar_estado_rutas");
        assert_eq!(def.parameters["required"][0], "query");
    }

    #[test]
    fn http_source_builds_from_config() {
        assert!(HttpPdfSource::new(&RouteReportConfig::default()).is_ok());
    }
}
