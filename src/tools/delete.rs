//! Delete tool — file and directory removal with a protected root.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};
use crate::workspace::Workspace;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    /// Path to delete.
    pub path: String,
    /// Remove directories together with their contents (default: false).
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub path: String,
    pub deleted: bool,
}

/// Delete `path`.
///
/// A missing path is always [`AgentError::NotFound`]. Symlinks are unlinked
/// themselves, never their targets. The workspace root can never be deleted.
pub fn delete_path(workspace: &Workspace, path: &str, recursive: bool) -> AgentResult<()> {
    // Resolve the parent and re-attach the final name so that a symlink
    // given as the last component is removed rather than followed.
    let resolved = workspace.resolve(path)?;
    if resolved.is_root() {
        warn!(path, recursive, "fs.delete refused for workspace root");
        return Err(AgentError::RootProtected);
    }
    let target = unresolved_leaf(workspace, path)?
        .unwrap_or_else(|| resolved.as_path().to_path_buf());
    let relative = workspace.relativize(&target);

    let meta = std::fs::symlink_metadata(&target).map_err(|e| {
        warn!(path = %relative.display(), "fs.delete missing path");
        AgentError::from_io(&relative, &e)
    })?;

    let result = if meta.is_dir() {
        if recursive {
            std::fs::remove_dir_all(&target)
        } else {
            std::fs::remove_dir(&target)
        }
    } else {
        std::fs::remove_file(&target)
    };
    result.map_err(|e| match AgentError::from_io(&relative, &e) {
        // Some platforms report a non-empty directory as AlreadyExists/Other.
        AgentError::Internal(_) if meta.is_dir() && !recursive && dir_has_entries(&target) => {
            AgentError::NotEmpty { path: relative.clone() }
        }
        other => other,
    })?;

    info!(path = %relative.display(), recursive, "fs.delete");
    Ok(())
}

/// If the last component of `path` is a symlink inside the workspace, return
/// the link's own location (the parent is resolved, the leaf is not).
fn unresolved_leaf(workspace: &Workspace, path: &str) -> AgentResult<Option<std::path::PathBuf>> {
    let raw = std::path::Path::new(path);
    let (Some(parent), Some(name)) = (raw.parent(), raw.file_name()) else {
        return Ok(None);
    };
    let parent = workspace.resolve(&parent.to_string_lossy())?;
    let leaf = parent.as_path().join(name);
    let is_symlink = std::fs::symlink_metadata(&leaf).is_ok_and(|m| m.file_type().is_symlink());
    Ok(is_symlink.then_some(leaf))
}

fn dir_has_entries(path: &std::path::Path) -> bool {
    std::fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some())
}

pub fn execute(workspace: &Workspace, params: &DeleteParams) -> AgentResult<DeleteResponse> {
    info!(path = params.path, recursive = params.recursive, "fs.delete request");
    delete_path(workspace, &params.path, params.recursive)?;
    Ok(DeleteResponse {
        path: params.path.clone(),
        deleted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::new(dir.path()).expect("workspace");
        (dir, ws)
    }

    #[test]
    fn test_delete_root_always_fails() {
        let (dir, ws) = setup();
        std::fs::write(dir.path().join("keep.txt"), "x").expect("write");
        for raw in ["", ".", "sub/..", dir.path().to_str().expect("utf8")] {
            for recursive in [false, true] {
                let err = delete_path(&ws, raw, recursive).expect_err("root");
                assert!(matches!(err, AgentError::RootProtected), "{raw:?}");
            }
        }
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_delete_missing_is_not_found_every_time() {
        let (_dir, ws) = setup();
        for _ in 0..2 {
            let err = delete_path(&ws, "ghost.txt", false).expect_err("missing");
            assert!(matches!(err, AgentError::NotFound { .. }));
        }
    }

    #[test]
    fn test_delete_file_and_empty_dir() {
        let (dir, ws) = setup();
        std::fs::write(dir.path().join("f.txt"), "x").expect("write");
        std::fs::create_dir(dir.path().join("empty")).expect("mkdir");

        delete_path(&ws, "f.txt", false).expect("file");
        delete_path(&ws, "empty", false).expect("empty dir");
        assert!(!dir.path().join("f.txt").exists());
        assert!(!dir.path().join("empty").exists());
    }

    #[test]
    fn test_delete_non_empty_dir_requires_recursive() {
        let (dir, ws) = setup();
        std::fs::create_dir_all(dir.path().join("tree/inner")).expect("mkdir");
        std::fs::write(dir.path().join("tree/inner/f.txt"), "x").expect("write");

        let err = delete_path(&ws, "tree", false).expect_err("not empty");
        assert!(matches!(err, AgentError::NotEmpty { .. }));
        assert!(dir.path().join("tree/inner/f.txt").exists());

        delete_path(&ws, "tree", true).expect("recursive");
        assert!(!dir.path().join("tree").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_symlink_removes_link_only() {
        let (dir, ws) = setup();
        std::fs::create_dir(dir.path().join("real")).expect("mkdir");
        std::fs::write(dir.path().join("real/f.txt"), "x").expect("write");
        std::os::unix::fs::symlink("real", dir.path().join("alias")).expect("symlink");

        delete_path(&ws, "alias", true).expect("delete link");
        assert!(!dir.path().join("alias").exists());
        assert!(dir.path().join("real/f.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_through_escaping_symlink_is_rejected() {
        let (dir, ws) = setup();
        let outside = tempfile::tempdir().expect("outside");
        std::fs::write(outside.path().join("victim.txt"), "x").expect("write");
        std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).expect("symlink");

        let err = delete_path(&ws, "out/victim.txt", false).expect_err("escape");
        assert!(matches!(err, AgentError::PathEscape { .. }));
        assert!(outside.path().join("victim.txt").exists());
    }
}
