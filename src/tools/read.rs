//! Read tool — whole-file reads confined to the workspace.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};
use crate::workspace::Workspace;

/// Parameters for the read tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadParams {
    /// Path to the file to read.
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResponse {
    pub path: String,
    pub content: String,
}

/// Read the full contents of `path` as bytes.
pub fn read_file(workspace: &Workspace, path: &str) -> AgentResult<Vec<u8>> {
    let resolved = workspace.resolve(path)?;
    let relative = resolved.relative();

    let meta = std::fs::metadata(resolved.as_path()).map_err(|e| {
        warn!(path = %relative.display(), error = %e, "fs.read missing path");
        AgentError::from_io(relative, &e)
    })?;
    if meta.is_dir() {
        return Err(AgentError::IsADirectory {
            path: relative.to_path_buf(),
        });
    }

    let bytes =
        std::fs::read(resolved.as_path()).map_err(|e| AgentError::from_io(relative, &e))?;
    info!(path = %relative.display(), bytes = bytes.len(), "fs.read");
    Ok(bytes)
}

/// Execute the read tool. Content is decoded as UTF-8, invalid sequences replaced.
pub fn execute(workspace: &Workspace, params: &ReadParams) -> AgentResult<ReadResponse> {
    info!(path = params.path, "fs.read request");
    let bytes = read_file(workspace, &params.path)?;
    Ok(ReadResponse {
        path: params.path.clone(),
        content: String::from_utf8_lossy(&bytes).into_owned(),
    })
}
