//! Workspace root and path resolution.
//!
//! Every filesystem operation goes through [`Workspace::resolve`], which
//! returns a [`ResolvedPath`] that is proven to stay inside the root after
//! `.`/`..` and symlink resolution.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::error::{AgentError, AgentResult};

/// Upper bound on symlinks followed while resolving a single path.
const MAX_SYMLINK_HOPS: usize = 40;

/// The fixed directory every operation is confined to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

/// An absolute path inside the workspace. Only [`Workspace::resolve`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative: PathBuf,
}

impl ResolvedPath {
    /// Absolute path on the host.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// Path relative to the workspace root (`.` for the root itself).
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Whether this is the workspace root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str() == "."
    }
}

impl Workspace {
    /// Create a workspace rooted at `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .with_context(|| format!("workspace root {} is not accessible", root.display()))?;
        if !root.is_dir() {
            bail!("workspace root {} is not a directory", root.display());
        }
        Ok(Self { root })
    }

    /// Canonical absolute path of the root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path against the root.
    ///
    /// Components are applied one at a time against the real filesystem so
    /// that `..` always pops a symlink-free prefix and every symlink, dangling
    /// or not, is followed before the boundary check.
    pub fn resolve(&self, raw: &str) -> AgentResult<ResolvedPath> {
        if raw.contains('\0') {
            return Err(AgentError::InvalidPath {
                path: raw.to_owned(),
                reason: "path contains null byte".to_owned(),
            });
        }

        let mut pending: VecDeque<OsString> = VecDeque::new();
        let mut resolved = self.root.clone();
        push_components(Path::new(raw), &mut resolved, &mut pending);

        let mut hops = 0usize;
        while let Some(part) = pending.pop_front() {
            if part == ".." {
                resolved.pop();
                continue;
            }

            let candidate = resolved.join(&part);
            let is_symlink = std::fs::symlink_metadata(&candidate)
                .is_ok_and(|meta| meta.file_type().is_symlink());
            if !is_symlink {
                resolved = candidate;
                continue;
            }

            hops += 1;
            if hops > MAX_SYMLINK_HOPS {
                return Err(AgentError::InvalidPath {
                    path: raw.to_owned(),
                    reason: "too many levels of symbolic links".to_owned(),
                });
            }
            let target = std::fs::read_link(&candidate)
                .map_err(|e| AgentError::from_io(Path::new(raw), &e))?;
            // Splice the link target in front of the remaining components.
            let mut spliced = VecDeque::new();
            push_components(&target, &mut resolved, &mut spliced);
            spliced.append(&mut pending);
            pending = spliced;
        }

        let Ok(relative) = resolved.strip_prefix(&self.root) else {
            tracing::warn!(path = raw, "path escapes workspace");
            return Err(AgentError::PathEscape {
                path: raw.to_owned(),
            });
        };
        let relative = if relative.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            relative.to_path_buf()
        };

        Ok(ResolvedPath {
            absolute: resolved,
            relative,
        })
    }

    /// Render an absolute path inside the workspace relative to the root.
    #[must_use]
    pub fn relativize(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }
}

/// Queue the components of `path`. A root component resets `resolved` to the
/// filesystem root (absolute input or absolute link target).
fn push_components(path: &Path, resolved: &mut PathBuf, queue: &mut VecDeque<OsString>) {
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                let mut root = PathBuf::new();
                for part in path.components() {
                    match part {
                        Component::Prefix(_) | Component::RootDir => root.push(part.as_os_str()),
                        _ => break,
                    }
                }
                *resolved = root;
            }
            Component::CurDir => {}
            Component::ParentDir => queue.push_back(OsString::from("..")),
            Component::Normal(name) => queue.push_back(name.to_os_string()),
        }
    }
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
    fn test_empty_and_dot_resolve_to_root() {
        let (_dir, ws) = setup();
        for raw in ["", ".", "./", "a/.."] {
            let resolved = ws.resolve(raw).expect("resolve");
            assert!(resolved.is_root(), "{raw:?} should resolve to root");
            assert_eq!(resolved.as_path(), ws.root());
        }
    }

    #[test]
    fn test_nonexistent_path_is_joined() {
        let (_dir, ws) = setup();
        let resolved = ws.resolve("new/dir/file.txt").expect("resolve");
        assert_eq!(resolved.as_path(), ws.root().join("new/dir/file.txt"));
        assert_eq!(resolved.relative(), Path::new("new/dir/file.txt"));
    }

    #[test]
    fn test_parent_traversal_is_rejected() {
        let (_dir, ws) = setup();
        for raw in ["..", "../x", "a/../../x", "missing/../../../etc/passwd"] {
            let err = ws.resolve(raw).expect_err("should escape");
            assert!(matches!(err, AgentError::PathEscape { .. }), "{raw:?}: {err}");
        }
    }

    #[test]
    fn test_absolute_paths() {
        let (dir, ws) = setup();
        let inside = ws.root().join("f.txt");
        let resolved = ws.resolve(inside.to_str().expect("utf8")).expect("inside");
        assert_eq!(resolved.relative(), Path::new("f.txt"));

        let err = ws.resolve("/etc/passwd").expect_err("outside");
        assert!(matches!(err, AgentError::PathEscape { .. }));
        drop(dir);
    }

    #[test]
    fn test_null_byte_is_invalid() {
        let (_dir, ws) = setup();
        let err = ws.resolve("a\0b").expect_err("null byte");
        assert!(matches!(err, AgentError::InvalidPath { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let (_dir, ws) = setup();
        let outside = tempfile::tempdir().expect("outside");
        std::os::unix::fs::symlink(outside.path(), ws.root().join("link")).expect("symlink");

        let err = ws.resolve("link").expect_err("escape");
        assert!(matches!(err, AgentError::PathEscape { .. }));
        let err = ws.resolve("link/new.txt").expect_err("escape");
        assert!(matches!(err, AgentError::PathEscape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_escape_is_rejected() {
        let (_dir, ws) = setup();
        let outside = tempfile::tempdir().expect("outside");
        let target = outside.path().join("not-yet-created");
        std::os::unix::fs::symlink(&target, ws.root().join("dangling")).expect("symlink");

        let err = ws.resolve("dangling").expect_err("escape");
        assert!(matches!(err, AgentError::PathEscape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_workspace_is_followed() {
        let (_dir, ws) = setup();
        std::fs::create_dir(ws.root().join("real")).expect("mkdir");
        std::os::unix::fs::symlink("real", ws.root().join("alias")).expect("symlink");

        let resolved = ws.resolve("alias/x.txt").expect("resolve");
        assert_eq!(resolved.relative(), Path::new("real/x.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_invalid() {
        let (_dir, ws) = setup();
        std::os::unix::fs::symlink("b", ws.root().join("a")).expect("symlink");
        std::os::unix::fs::symlink("a", ws.root().join("b")).expect("symlink");

        let err = ws.resolve("a").expect_err("loop");
        assert!(matches!(err, AgentError::InvalidPath { .. }));
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(Workspace::new(dir.path().join("missing")).is_err());
    }
}
