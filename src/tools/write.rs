//! Write tool — file creation and overwrite with optional parent creation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};
use crate::util::atomic::atomic_write;
use crate::workspace::Workspace;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteParams {
    /// Path to the file to write.
    pub path: String,
    /// Content to write.
    pub content: String,
    /// Create missing parent directories (default: true).
    #[serde(default = "default_create_parents", alias = "create_parents")]
    pub create_parents: bool,
}

const fn default_create_parents() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub path: String,
    pub bytes_written: usize,
}

/// Write `content` to `path`, replacing any existing file atomically.
///
/// Returns the number of bytes written.
pub fn write_file(
    workspace: &Workspace,
    path: &str,
    content: &[u8],
    create_parents: bool,
) -> AgentResult<usize> {
    let resolved = workspace.resolve(path)?;
    let relative = resolved.relative();

    if resolved.is_root() || resolved.as_path().is_dir() {
        return Err(AgentError::IsADirectory {
            path: relative.to_path_buf(),
        });
    }

    if let Some(parent) = resolved.as_path().parent() {
        if let Some(blocker) = non_directory_ancestor(parent) {
            warn!(path = %relative.display(), "fs.write ancestor is not a directory");
            return Err(AgentError::NotADirectory {
                path: workspace.relativize(&blocker),
            });
        }
        if create_parents {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgentError::from_io(&workspace.relativize(parent), &e)
            })?;
        } else if !parent.is_dir() {
            warn!(path = %relative.display(), "fs.write missing parent directory");
            return Err(AgentError::NotFound {
                path: workspace.relativize(parent),
            });
        }
    }

    atomic_write(resolved.as_path(), content).map_err(|e| AgentError::from_io(relative, &e))?;

    info!(
        path = %relative.display(),
        bytes = content.len(),
        create_parents,
        "fs.write"
    );
    Ok(content.len())
}

/// The nearest existing ancestor of `dir` (itself included) when it is not a
/// directory.
fn non_directory_ancestor(dir: &Path) -> Option<PathBuf> {
    let existing = dir.ancestors().find(|p| p.symlink_metadata().is_ok())?;
    if existing.is_dir() {
        None
    } else {
        Some(existing.to_path_buf())
    }
}

pub fn execute(workspace: &Workspace, params: &WriteParams) -> AgentResult<WriteResponse> {
    info!(
        path = params.path,
        create_parents = params.create_parents,
        bytes = params.content.len(),
        "fs.write request"
    );
    let bytes_written = write_file(
        workspace,
        &params.path,
        params.content.as_bytes(),
        params.create_parents,
    )?;
    Ok(WriteResponse {
        path: params.path.clone(),
        bytes_written,
    })
}
