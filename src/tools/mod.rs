//! Tool router — owns the workspace and dispatches operations.
//!
//! Filesystem and search tools are blocking and run on the blocking pool;
//! the exec tool is async end to end. The router is cheap to clone and is
//! shared by every HTTP handler.

pub mod delete;
pub mod exec;
pub mod list;
pub mod read;
pub mod search;
pub mod write;

use std::sync::Arc;

use tracing::debug;

use crate::error::{AgentError, AgentResult};
use crate::workspace::Workspace;

use self::exec::{ExecLimits, ProcessRunner};

/// Dispatches tool calls against a single workspace.
#[derive(Debug, Clone)]
pub struct ToolRouter {
    workspace: Arc<Workspace>,
    runner: ProcessRunner,
}

impl ToolRouter {
    /// Create a new tool router.
    #[must_use]
    pub fn new(workspace: Arc<Workspace>, limits: ExecLimits) -> Self {
        let runner = ProcessRunner::new(Arc::clone(&workspace), limits);
        Self { workspace, runner }
    }

    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run a command on its own task.
    ///
    /// The caller dropping this future (a client disconnect) does not cancel
    /// the command; it still runs to completion or to its deadline.
    pub async fn exec(&self, params: exec::ExecParams) -> AgentResult<exec::CommandResult> {
        debug!(tool = "exec", "dispatching tool call");
        let runner = self.runner.clone();
        tokio::spawn(async move { runner.run(&params).await })
            .await
            .map_err(|e| AgentError::Internal(format!("exec task failed: {e}")))?
    }

    pub async fn read(&self, params: read::ReadParams) -> AgentResult<read::ReadResponse> {
        self.blocking("read", move |ws| read::execute(ws, &params)).await
    }

    pub async fn write(&self, params: write::WriteParams) -> AgentResult<write::WriteResponse> {
        self.blocking("write", move |ws| write::execute(ws, &params)).await
    }

    pub async fn delete(
        &self,
        params: delete::DeleteParams,
    ) -> AgentResult<delete::DeleteResponse> {
        self.blocking("delete", move |ws| delete::execute(ws, &params)).await
    }

    pub async fn list(&self, params: list::ListParams) -> AgentResult<list::ListResponse> {
        self.blocking("list", move |ws| list::execute(ws, &params)).await
    }

    pub async fn search(
        &self,
        params: search::SearchParams,
    ) -> AgentResult<search::SearchResponse> {
        self.blocking("search", move |ws| search::execute(ws, &params)).await
    }

    /// Run a blocking tool on tokio's blocking pool so slow disks never stall
    /// the request executor.
    async fn blocking<T, F>(&self, tool: &'static str, f: F) -> AgentResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Workspace) -> AgentResult<T> + Send + 'static,
    {
        debug!(tool, "dispatching tool call");
        let workspace = Arc::clone(&self.workspace);
        tokio::task::spawn_blocking(move || f(&workspace))
            .await
            .map_err(|e| AgentError::Internal(format!("{tool} task failed: {e}")))?
    }
}
