// MCP（tool-calling）伺服器：與 HTTP API 共用同一個稽核服務

use crate::config::cli::LocalStorage;
use crate::core::audit::{AuditRequest, RecommendationFilter};
use crate::core::AuditService;
use crate::domain::model::{CustomerId, DateRange, Priority};
use crate::domain::ports::DataProvider;
// 巨集展開使用兩個參數的 Result，本 crate 的別名需改名
use crate::utils::error::{NavError, Result as NavResult};
use crate::utils::pagination::PageRequest;
use chrono::Utc;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

pub type McpAuditService = AuditService<Arc<dyn DataProvider>, LocalStorage>;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EmptyRequest {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunAuditRequest {
    /// Google Ads customer id, with or without dashes
    pub customer_id: String,
    /// First day (YYYY-MM-DD); requires end_date
    #[serde(default)]
    pub start_date: Option<String>,
    /// Last day (YYYY-MM-DD); requires start_date
    #[serde(default)]
    pub end_date: Option<String>,
    /// Number of days ending yesterday when no dates are given
    #[serde(default)]
    pub days: Option<u32>,
    /// Analyzer names; empty runs the configured defaults
    #[serde(default)]
    pub analyzers: Vec<String>,
    /// "en" or "es"
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AuditIdRequest {
    pub audit_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecommendationsRequest {
    pub audit_id: String,
    /// critical, high, medium or low
    #[serde(default)]
    pub min_priority: Option<String>,
    #[serde(default)]
    pub analyzer: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

fn to_mcp_error(error: NavError) -> McpError {
    match error {
        NavError::ValidationError { .. } | NavError::NotFound { .. } => {
            McpError::invalid_params(error.user_friendly_message(), None)
        }
        other => McpError::internal_error(other.user_friendly_message(), None),
    }
}

fn to_tool_result(result: NavResult<Value>) -> std::result::Result<CallToolResult, McpError> {
    let value = result.map_err(to_mcp_error)?;
    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn parse_audit_id(raw: &str) -> NavResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| NavError::validation(format!("Invalid audit id '{}'", raw)))
}

#[derive(Clone)]
pub struct AuditMcpServer {
    audits: Arc<McpAuditService>,
    default_days: u32,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl AuditMcpServer {
    pub fn new(audits: Arc<McpAuditService>, default_days: u32) -> Self {
        Self {
            audits,
            default_days,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List the available audit analyzers and the reports each one needs")]
    async fn list_analyzers(
        &self,
        _params: Parameters<EmptyRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        to_tool_result(self.analyzers_value())
    }

    #[tool(
        description = "Run a paid-search audit for a customer and date range. Returns the audit id, status, and recommendation counts."
    )]
    async fn run_audit(
        &self,
        params: Parameters<RunAuditRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        to_tool_result(self.run_audit_value(params.0).await)
    }

    #[tool(description = "Fetch a finished audit report by id")]
    async fn get_audit(
        &self,
        params: Parameters<AuditIdRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        to_tool_result(self.audit_value(&params.0.audit_id).await)
    }

    #[tool(
        description = "List recommendations of an audit ordered by priority. Optional filters: min_priority, analyzer, page, per_page."
    )]
    async fn get_recommendations(
        &self,
        params: Parameters<RecommendationsRequest>,
    ) -> std::result::Result<CallToolResult, McpError> {
        to_tool_result(self.recommendations_value(params.0).await)
    }
}

impl AuditMcpServer {
    fn analyzers_value(&self) -> NavResult<Value> {
        Ok(serde_json::to_value(self.audits.registry().describe())?)
    }

    async fn run_audit_value(&self, request: RunAuditRequest) -> NavResult<Value> {
        let customer_id = CustomerId::new(&request.customer_id)?;
        let date_range = match (&request.start_date, &request.end_date) {
            (Some(start), Some(end)) => DateRange::parse(start, end)?,
            (None, None) => DateRange::last_n_days(
                request.days.unwrap_or(self.default_days),
                Utc::now().date_naive(),
            )?,
            _ => {
                return Err(NavError::validation(
                    "start_date and end_date must be given together",
                ))
            }
        };

        let mut audit = AuditRequest::new(customer_id, date_range).with_analyzers(request.analyzers);
        if let Some(locale) = request.locale {
            audit = audit.with_locale(locale);
        }

        let report = self.audits.run_audit(audit).await?;
        Ok(json!({
            "audit_id": report.id,
            "status": report.status,
            "error": report.error,
            "recommendations": report.total_recommendations(),
            "estimated_savings": (report.total_estimated_savings() * 100.0).round() / 100.0,
            "analyzers": report.outcomes,
            "summaries": report
                .results
                .iter()
                .map(|r| json!({ "analyzer": r.analyzer, "summary": r.summary }))
                .collect::<Vec<_>>(),
        }))
    }

    async fn audit_value(&self, audit_id: &str) -> NavResult<Value> {
        let report = self.audits.get_audit(parse_audit_id(audit_id)?).await?;
        Ok(serde_json::to_value(report)?)
    }

    async fn recommendations_value(&self, request: RecommendationsRequest) -> NavResult<Value> {
        let id = parse_audit_id(&request.audit_id)?;
        let min_priority = request
            .min_priority
            .as_deref()
            .map(|raw| {
                Priority::parse(raw)
                    .ok_or_else(|| NavError::validation(format!("Invalid min_priority '{}'", raw)))
            })
            .transpose()?;
        let filter = RecommendationFilter {
            min_priority,
            analyzer: request.analyzer,
        };
        let defaults = PageRequest::default();
        let page = PageRequest::new(
            request.page.unwrap_or(defaults.page),
            request.per_page.unwrap_or(defaults.per_page),
        );

        let page = self.audits.recommendations(id, &filter, page).await?;
        Ok(serde_json::to_value(page)?)
    }
}

#[tool_handler]
impl ServerHandler for AuditMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Paid search audit tools. Call list_analyzers, then run_audit with a customer id \
                 and date range, then get_recommendations with the returned audit_id."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// 以 stdio 提供 MCP 服務直到用戶端斷線
pub async fn serve_stdio(server: AuditMcpServer) -> NavResult<()> {
    tracing::info!("🚀 MCP server starting on stdio");
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| NavError::ProcessingError {
            message: format!("MCP initialization failed: {}", e),
        })?;

    service.waiting().await.map_err(|e| NavError::ProcessingError {
        message: format!("MCP server stopped unexpectedly: {}", e),
    })?;
    tracing::info!("✅ MCP server shut down");
    Ok(())
}
