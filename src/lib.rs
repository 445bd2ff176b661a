//! `codespace-agent` — HTTP agent for command execution and file operations.
//!
//! Exposes a small set of operations over JSON/HTTP so that an automated
//! caller can inspect and modify a project's working tree and run its
//! tooling without direct shell access. Every path is confined to a single
//! workspace root fixed at start-up.
//!
//! # Tools
//!
//! - `exec` — shell command with timeout and bounded stdout/stderr capture
//! - `read` — whole-file read
//! - `write` — atomic write (tempfile + rename) with optional parent creation
//! - `delete` — file/directory removal; the workspace root is protected
//! - `list` — sorted directory listing, hidden entries on request
//! - `search` — regex search with glob filter and a hard result cap
//!
//! # Architecture
//!
//! ```text
//! HTTP (axum) → server handlers → ToolRouter → Workspace::resolve
//!                                      ↓
//!                      read / write / delete / list / search (blocking pool)
//!                      exec (tokio::process, process-group kill on timeout)
//! ```

pub mod error;
pub mod server;
pub mod tools;
pub mod util;
pub mod workspace;

pub use error::{AgentError, AgentResult};
pub use server::{AgentConfig, cors_layer, router, run_server};
pub use workspace::{ResolvedPath, Workspace};
