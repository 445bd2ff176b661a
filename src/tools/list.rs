//! List tool — immediate children of a directory, sorted by name.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AgentError, AgentResult};
use crate::workspace::Workspace;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Directory to list (default: workspace root).
    #[serde(default = "default_path")]
    pub path: String,
    /// Include dot-prefixed entries (default: false).
    #[serde(default, alias = "include_hidden")]
    pub include_hidden: bool,
}

fn default_path() -> String {
    ".".to_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Sockets, fifos, dangling symlinks and symlinks leaving the workspace.
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub name: String,
    /// Path relative to the workspace root.
    pub path: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub path: String,
    pub entries: Vec<ListEntry>,
}

/// List the immediate children of `path`.
pub fn list_dir(
    workspace: &Workspace,
    path: &str,
    include_hidden: bool,
) -> AgentResult<Vec<ListEntry>> {
    let resolved = workspace.resolve(path)?;
    let relative = resolved.relative();

    let meta = std::fs::metadata(resolved.as_path()).map_err(|e| {
        warn!(path = %relative.display(), "fs.list missing path");
        AgentError::from_io(relative, &e)
    })?;
    if !meta.is_dir() {
        warn!(path = %relative.display(), "fs.list not a directory");
        return Err(AgentError::NotADirectory {
            path: relative.to_path_buf(),
        });
    }

    let entries =
        std::fs::read_dir(resolved.as_path()).map_err(|e| AgentError::from_io(relative, &e))?;

    let mut listing = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AgentError::from_io(relative, &e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !include_hidden && name.starts_with('.') {
            continue;
        }

        let entry_relative = workspace.relativize(&entry.path());
        let (kind, size) = entry_kind(workspace, &entry, &entry_relative);

        listing.push(ListEntry {
            path: entry_relative.display().to_string(),
            name,
            kind,
            size,
        });
    }

    listing.sort_by(|a, b| a.name.cmp(&b.name));

    info!(
        path = %relative.display(),
        count = listing.len(),
        include_hidden,
        "fs.list"
    );
    Ok(listing)
}

/// Kind and size of a listed entry. Symlinks are followed only while their
/// target stays inside the workspace; anything else is [`EntryKind::Other`].
fn entry_kind(
    workspace: &Workspace,
    entry: &std::fs::DirEntry,
    relative: &Path,
) -> (EntryKind, Option<u64>) {
    let is_link = entry.file_type().is_ok_and(|t| t.is_symlink());
    let target = if is_link {
        match workspace.resolve(&relative.to_string_lossy()) {
            Ok(resolved) => resolved.as_path().to_path_buf(),
            Err(e) => {
                debug!(path = %relative.display(), error = %e, "fs.list unresolvable symlink");
                return (EntryKind::Other, None);
            }
        }
    } else {
        entry.path()
    };

    match std::fs::metadata(target) {
        Ok(m) if m.is_file() => (EntryKind::File, Some(m.len())),
        Ok(m) if m.is_dir() => (EntryKind::Directory, None),
        _ => (EntryKind::Other, None),
    }
}

pub fn execute(workspace: &Workspace, params: &ListParams) -> AgentResult<ListResponse> {
    info!(path = params.path, include_hidden = params.include_hidden, "fs.list request");
    let entries = list_dir(workspace, &params.path, params.include_hidden)?;
    Ok(ListResponse {
        path: params.path.clone(),
        entries,
    })
}
