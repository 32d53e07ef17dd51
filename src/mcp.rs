//! MCP (Model Context Protocol) server for scoutstats.
//!
//! Exposes the `ops` layer as MCP tools so that AI assistants can query
//! registration statistics over stdio JSON-RPC.
//!
//! Start with: `scoutstats --mcp`

use rmcp::{
    handler::server::tool::{ToolCallContext, ToolRouter},
    handler::server::wrapper::Parameters,
    model::*,
    service::RequestContext,
    tool, tool_router, ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::algo::dataset::{Dataset, GroupId};
use crate::algo::selection::SelectionState;
use crate::algo::table::{ColumnFilterSpec, SortSpec, TableQuery};
use crate::ops;

// ── Parameter structs ───────────────────────────────────────────────────────
// Every tool takes the same data-source fields. `JsonSchema` is required by
// rmcp so the input schema is generated for the client.

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct DataSource {
    /// Inline dataset: `{ "villages": [...] }`, a group page, or a list of groups.
    pub data: Option<serde_json::Value>,
    /// Path to a dataset JSON file. Ignored when `data` is given.
    pub data_path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectionParams {
    #[serde(flatten)]
    pub source: DataSource,
    /// Selected scout group ids. Omit to use every group.
    pub groups: Option<Vec<GroupId>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AggregateParams {
    #[serde(flatten)]
    pub source: DataSource,
    /// Selected scout group ids. Omit to use every group.
    pub groups: Option<Vec<GroupId>>,
    /// Category name, as listed by the `categories` tool.
    pub category: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TableParams {
    #[serde(flatten)]
    pub source: DataSource,
    /// Selected scout group ids. Omit to use every group.
    pub groups: Option<Vec<GroupId>>,
    /// Column ids (`Category§Question§Answer`). Empty means all columns.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Sort column, optionally suffixed with `:asc` or `:desc`.
    pub sort: Option<String>,
    /// Filters, e.g. `{"column": "num_participants", "range": {"min": 20}}`,
    /// `{"column": "Resa§Ankomsttid", "oneOf": ["08:00"]}` or
    /// `{"column": "name", "contains": "scout"}`.
    #[serde(default)]
    pub filters: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectParams {
    #[serde(flatten)]
    pub source: DataSource,
    /// Current selection state (`selectedGroupIds`, `selectionChoiceLabel`,
    /// `expandedVillageIds`). Omit to start from an empty selection.
    pub state: Option<serde_json::Value>,
    /// Operation, tagged by `op`: `toggleGroup {id}`, `toggleVillage {village}`,
    /// `clear`, `selectAll {filter?}`, `narrow {ids, label?}`,
    /// `narrowByAnswer {category, subQuestion, answer}`, `toggleExpansion {village}`.
    pub op: serde_json::Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VillagesParams {
    #[serde(flatten)]
    pub source: DataSource,
    /// Case-insensitive search over village and group names.
    pub filter: Option<String>,
}

fn json_text(v: &serde_json::Value) -> String {
    serde_json::to_string_pretty(v).unwrap_or_default()
}

fn load(source: DataSource) -> Result<Dataset, McpError> {
    match source.data {
        Some(value) => Ok(Dataset::from_value(&value)),
        None => ops::resolve_dataset(source.data_path.as_deref())
            .map_err(|e| McpError::invalid_params(e.to_string(), None)),
    }
}

fn success(result: &serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(json_text(result))])
}

fn join_error(e: tokio::task::JoinError) -> McpError {
    McpError::internal_error(format!("task join error: {e}"), None)
}

// ── Server ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ScoutStatsMcp {
    #[allow(dead_code)] // accessed at runtime by the #[tool_router] macro
    tool_router: ToolRouter<Self>,
}

impl Default for ScoutStatsMcp {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_router]
impl ScoutStatsMcp {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "categories",
        description = "List the statistics categories present in the selected scout groups, sorted by code point."
    )]
    async fn categories(&self, params: Parameters<SelectionParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let result = tokio::task::spawn_blocking(move || {
            let dataset = load(p.source)?;
            Ok::<_, McpError>(ops::op_categories(&dataset, p.groups.as_deref()))
        })
        .await
        .map_err(join_error)??;
        Ok(success(&result))
    }

    #[tool(
        name = "participants",
        description = "Total number of participants over the selected scout groups."
    )]
    async fn participants(&self, params: Parameters<SelectionParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let result = tokio::task::spawn_blocking(move || {
            let dataset = load(p.source)?;
            Ok::<_, McpError>(ops::op_participants(&dataset, p.groups.as_deref()))
        })
        .await
        .map_err(join_error)??;
        Ok(success(&result))
    }

    #[tool(
        name = "aggregate",
        description = "Aggregate one category across the selected scout groups. Returns sub-questions keyed by name: `answers` sub-questions with summed counts and free-text answers, and `perGroup` sub-questions with each group's answer plus `groupedByAnswer`. Flat categories are collected under `_direct`."
    )]
    async fn aggregate(&self, params: Parameters<AggregateParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let result = tokio::task::spawn_blocking(move || {
            let dataset = load(p.source)?;
            Ok::<_, McpError>(ops::op_aggregate(&dataset, p.groups.as_deref(), &p.category))
        })
        .await
        .map_err(join_error)??;
        Ok(success(&result))
    }

    #[tool(
        name = "table",
        description = "Per-group table: one row per selected scout group, one column per statistics leaf. Returns the column hierarchy, column metadata (number or text with unique values) and filtered, sorted rows."
    )]
    async fn table(&self, params: Parameters<TableParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let result = tokio::task::spawn_blocking(move || {
            let filters = p
                .filters
                .into_iter()
                .map(serde_json::from_value::<ColumnFilterSpec>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| McpError::invalid_params(format!("invalid filter: {e}"), None))?;
            let query = TableQuery {
                columns: p.columns,
                filters,
                sort: p.sort.as_deref().map(SortSpec::parse),
            };
            let dataset = load(p.source)?;
            Ok::<_, McpError>(ops::op_table(&dataset, p.groups.as_deref(), &query))
        })
        .await
        .map_err(join_error)??;
        Ok(success(&result))
    }

    #[tool(
        name = "select",
        description = "Apply one selection operation to a selection state and return the new state with its label chain, participant total and per-village check states."
    )]
    async fn select(&self, params: Parameters<SelectParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let result = tokio::task::spawn_blocking(move || {
            let state: SelectionState = match p.state {
                Some(v) => serde_json::from_value(v)
                    .map_err(|e| McpError::invalid_params(format!("invalid state: {e}"), None))?,
                None => SelectionState::default(),
            };
            let op: ops::SelectOp = serde_json::from_value(p.op)
                .map_err(|e| McpError::invalid_params(format!("invalid op: {e}"), None))?;
            let dataset = load(p.source)?;
            ops::op_select(&dataset, state, &op)
                .map_err(|e| McpError::invalid_params(e.to_string(), None))
        })
        .await
        .map_err(join_error)??;
        Ok(success(&result))
    }

    #[tool(
        name = "villages",
        description = "List villages and their scout groups, optionally filtered by a case-insensitive search over village and group names."
    )]
    async fn villages(&self, params: Parameters<VillagesParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let result = tokio::task::spawn_blocking(move || {
            let dataset = load(p.source)?;
            Ok::<_, McpError>(ops::op_villages(&dataset, p.filter.as_deref()))
        })
        .await
        .map_err(join_error)??;
        Ok(success(&result))
    }
}

// ── ServerHandler glue ──────────────────────────────────────────────────────

impl ServerHandler for ScoutStatsMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Scout registration statistics. Tools: categories, participants, aggregate, \
                 table, select, villages. Every tool reads the dataset from `data` (inline \
                 JSON), `data_path`, or the configured default; `groups` restricts a query \
                 to the selected scout group ids."
                    .into(),
            ),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: None }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "scoutstats".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: Some("Scout Statistics".into()),
                description: Some(
                    "Registration statistics aggregation for scout group survey data".into(),
                ),
                icons: None,
                website_url: None,
            },
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: Default::default(),
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let tool_context = ToolCallContext::new(self, request, context);
        async move { self.tool_router.call(tool_context).await }
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tool_router.get(name).cloned()
    }
}

// ── Entry point ─────────────────────────────────────────────────────────────

/// Start the MCP server on stdio. Called from `cli.rs` when `--mcp` is passed.
pub async fn serve_stdio() -> Result<(), Box<dyn std::error::Error>> {
    let server = ScoutStatsMcp::new();
    let transport = rmcp::transport::io::stdio();
    let service = server.serve(transport).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP serve error");
    })?;
    service.waiting().await?;
    Ok(())
}
