//! Error types for the codespace-agent crate.

use std::io;
use std::path::{Path, PathBuf};

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Typed failures surfaced by the workspace operations.
///
/// Every variant maps to exactly one HTTP status (see [`AgentError::status_code`]).
/// Paths carried by the variants are relative to the workspace root.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The path resolves outside the workspace root.
    #[error("path escapes workspace boundary: {path}")]
    PathEscape { path: String },

    /// The path is malformed (NUL byte, symlink loop, ...).
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A request argument was rejected (bad regex, bad glob, zero timeout).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Nothing exists at the path.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    /// The operation needs a file but the path names a directory.
    #[error("is a directory: {path}")]
    IsADirectory { path: PathBuf },

    /// The operation needs a directory but the path names something else.
    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Non-recursive delete of a directory that still has entries.
    #[error("directory not empty: {path}")]
    NotEmpty { path: PathBuf },

    /// Attempt to delete the workspace root itself.
    #[error("refusing to delete the workspace root")]
    RootProtected,

    /// Unexpected OS failure. The detail is logged, never returned to callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Map an I/O error raised while operating on `path`.
    ///
    /// Only the kinds that have a typed counterpart are preserved; everything
    /// else (permission denied included) collapses into [`AgentError::Internal`].
    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::IsADirectory => Self::IsADirectory { path },
            io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            io::ErrorKind::DirectoryNotEmpty => Self::NotEmpty { path },
            _ => Self::Internal(format!("{}: {err}", path.display())),
        }
    }

    /// Short machine-readable name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PathEscape { .. } => "path_escape",
            Self::InvalidPath { .. } => "invalid_path",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::IsADirectory { .. } => "is_a_directory",
            Self::NotADirectory { .. } => "not_a_directory",
            Self::NotEmpty { .. } => "not_empty",
            Self::RootProtected => "root_protected",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// - PathEscape, RootProtected: 403 Forbidden
    /// - InvalidPath, InvalidArgument, IsADirectory, NotADirectory: 400 Bad Request
    /// - NotFound: 404 Not Found
    /// - NotEmpty: 409 Conflict
    /// - Internal: 500 Internal Server Error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::PathEscape { .. } | Self::RootProtected => StatusCode::FORBIDDEN,
            Self::InvalidPath { .. }
            | Self::InvalidArgument(_)
            | Self::IsADirectory { .. }
            | Self::NotADirectory { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::NotEmpty { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            Self::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                "internal error".to_owned()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "error": self.kind(),
            "detail": detail,
        });
        (status, Json(body)).into_response()
    }
}

/// Convenience result type for codespace-agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_preserves_typed_kinds() {
        let path = Path::new("a/b.txt");
        let err = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(AgentError::from_io(path, &err), AgentError::NotFound { .. }));

        let err = io::Error::from(io::ErrorKind::DirectoryNotEmpty);
        assert!(matches!(AgentError::from_io(path, &err), AgentError::NotEmpty { .. }));

        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(AgentError::from_io(path, &err), AgentError::Internal(_)));
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AgentError::PathEscape { path: "../x".into() }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AgentError::RootProtected.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AgentError::NotFound { path: "x".into() }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AgentError::NotEmpty { path: "x".into() }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AgentError::IsADirectory { path: "x".into() }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AgentError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_response_hides_detail() {
        let response = AgentError::Internal("secret: /etc/shadow".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
