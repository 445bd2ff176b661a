//! HTTP gateway — axum routes over the tool router.
//!
//! Routes:
//! - `GET  /health`     liveness and workspace info
//! - `POST /exec`       run a shell command
//! - `POST /fs/read`    read a file
//! - `POST /fs/write`   write a file atomically
//! - `POST /fs/delete`  delete a file or directory
//! - `POST /fs/list`    list a directory
//! - `POST /fs/search`  regex search over files
//!
//! Every failure is an [`AgentError`] rendered as `{"error", "detail"}` with
//! the status from [`AgentError::status_code`]. A CORS layer answers browser
//! preflights for the configured origins.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use crate::error::AgentResult;
use crate::tools::exec::{CommandResult, ExecLimits, ExecParams};
use crate::tools::ToolRouter;
use crate::tools::delete::{DeleteParams, DeleteResponse};
use crate::tools::list::{ListParams, ListResponse};
use crate::tools::read::{ReadParams, ReadResponse};
use crate::tools::search::{SearchParams, SearchResponse};
use crate::tools::write::{WriteParams, WriteResponse};
use crate::workspace::Workspace;

/// Largest accepted request body (file writes carry whole files).
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Directory every operation is confined to.
    pub workspace: PathBuf,
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Limits for the exec tool.
    pub limits: ExecLimits,
    /// Origins allowed by CORS; `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            limits: ExecLimits::default(),
            cors_origins: vec!["*".to_owned()],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    workspace: String,
}

/// Build the CORS layer for `origins`. An empty list or `*` allows any origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values = origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {o:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the axum router for `tools`.
pub fn router(tools: ToolRouter, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/exec", post(exec))
        .route("/fs/read", post(read))
        .route("/fs/write", post(write))
        .route("/fs/delete", post(delete))
        .route("/fs/list", post(list))
        .route("/fs/search", post(search))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(tools)
}

/// Bind `config.bind` and serve until Ctrl-C / SIGTERM.
pub async fn run_server(config: AgentConfig) -> Result<()> {
    let workspace = Arc::new(Workspace::new(&config.workspace)?);
    info!(
        workspace = %workspace.root().display(),
        bind = %config.bind,
        shell = %config.limits.shell.display(),
        cors_origins = ?config.cors_origins,
        "codespace-agent starting"
    );

    let cors = cors_layer(&config.cors_origins)?;
    let app = router(ToolRouter::new(workspace, config.limits), cors);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    info!(addr = %config.bind, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("codespace-agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received, draining in-flight requests");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(tools): State<ToolRouter>) -> Json<HealthResponse> {
    info!("health check request");
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        workspace: tools.workspace().root().display().to_string(),
    })
}

async fn exec(
    State(tools): State<ToolRouter>,
    Json(params): Json<ExecParams>,
) -> AgentResult<Json<CommandResult>> {
    tools.exec(params).await.map(Json)
}

async fn read(
    State(tools): State<ToolRouter>,
    Json(params): Json<ReadParams>,
) -> AgentResult<Json<ReadResponse>> {
    tools.read(params).await.map(Json)
}

async fn write(
    State(tools): State<ToolRouter>,
    Json(params): Json<WriteParams>,
) -> AgentResult<Json<WriteResponse>> {
    tools.write(params).await.map(Json)
}

async fn delete(
    State(tools): State<ToolRouter>,
    Json(params): Json<DeleteParams>,
) -> AgentResult<Json<DeleteResponse>> {
    tools.delete(params).await.map(Json)
}

async fn list(
    State(tools): State<ToolRouter>,
    Json(params): Json<ListParams>,
) -> AgentResult<Json<ListResponse>> {
    tools.list(params).await.map(Json)
}

async fn search(
    State(tools): State<ToolRouter>,
    Json(params): Json<SearchParams>,
) -> AgentResult<Json<SearchResponse>> {
    tools.search(params).await.map(Json)
}
