//! Transports: MCP over stdio, and an HTTP server.
//!
//! The HTTP server carries both the MCP Streamable HTTP endpoint and a
//! plain JSON API over the same [`ToolRegistry`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/mcp` | MCP Streamable HTTP (JSON-RPC) |
//! | `GET`  | `/tools/list` | List all tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "search: missing required parameter: userId" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `timeout` (408),
//! `tool_error` (500).
//!
//! # MCP client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "scoped-search": {
//!       "command": "scoped-search",
//!       "args": ["--config", "/etc/scoped-search.toml", "serve", "stdio"]
//!     }
//!   }
//! }
//! ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::mcp::McpBridge;
use crate::models::ToolOutput;
use crate::tools::{ToolContext, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

/// Serve MCP over stdin/stdout until the client disconnects.
pub async fn run_stdio(tools: Arc<ToolRegistry>, ctx: ToolContext) -> anyhow::Result<()> {
    tracing::info!(tools = tools.len(), "MCP server ready on stdio");

    let service = McpBridge::new(tools, ctx)
        .serve(rmcp::transport::stdio())
        .await?;
    service.waiting().await?;

    tracing::info!("MCP client disconnected");
    Ok(())
}

/// Build the HTTP router: `/mcp`, `/tools/*`, and `/health`.
pub fn router(tools: Arc<ToolRegistry>, ctx: ToolContext) -> Router {
    let bridge = McpBridge::new(tools.clone(), ctx.clone());
    let session_manager: Arc<LocalSessionManager> = Default::default();
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        session_manager,
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(AppState { tools, ctx })
}

/// Bind `bind_addr` and serve until the process is terminated.
pub async fn run_http(
    bind_addr: &str,
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
) -> anyhow::Result<()> {
    let app = router(tools, ctx);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("MCP server listening on http://{}/mcp", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: String) -> AppError {
    AppError {
        status,
        code,
        message,
    }
}

/// Map a tool failure to an HTTP status by its message.
///
/// Parameter problems are 400, unknown tools 404, client-side timeouts 408,
/// and everything else (cluster or cache failures) 500.
fn classify_tool_error(tool_name: &str, err: &anyhow::Error) -> AppError {
    let msg = format!("{}: {:#}", tool_name, err);
    let root = err.to_string();

    if root.starts_with("tool not found") {
        app_error(StatusCode::NOT_FOUND, "not_found", msg)
    } else if root.contains("missing required parameter")
        || root.contains("invalid parameter")
        || root.contains("must not be empty")
        || root.contains("is required")
        || root.contains("must be")
    {
        app_error(StatusCode::BAD_REQUEST, "bad_request", msg)
    } else if msg.contains("timed out") {
        app_error(StatusCode::REQUEST_TIMEOUT, "timeout", msg)
    } else {
        app_error(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::of(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

#[derive(Serialize)]
struct ToolCallResponse {
    result: ToolOutput,
}

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<ToolCallResponse>, AppError> {
    let result = state
        .tools
        .call(&name, params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, &e))?;

    Ok(Json(ToolCallResponse { result }))
}
