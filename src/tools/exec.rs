//! Exec tool — shell command execution with timeout and bounded capture.
//!
//! The command string is handed verbatim to `<shell> -c`. stdout and stderr
//! are drained by independent tasks into capped buffers; bytes past the cap
//! are discarded but the pipes keep being read so the child never blocks on
//! a full pipe. On timeout the child's process group receives SIGTERM, then
//! SIGKILL after a grace period.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{AgentError, AgentResult};
use crate::workspace::Workspace;

/// Exit code reported when the command was killed for exceeding its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecParams {
    /// The shell command to execute.
    pub command: String,
    /// Working directory relative to the workspace (default: workspace root).
    #[serde(default)]
    pub cwd: Option<String>,
    /// Execution timeout in seconds (default: 120).
    #[serde(default = "default_timeout", alias = "timeout_seconds")]
    pub timeout_seconds: u64,
}

const fn default_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration_ms: u64,
}

/// Resource limits applied to every command.
#[derive(Debug, Clone)]
pub struct ExecLimits {
    /// Shell used to interpret the command string.
    pub shell: PathBuf,
    /// Largest accepted timeout; larger requests are clamped.
    pub max_timeout: Duration,
    /// Per-stream capture ceiling in bytes.
    pub max_output_bytes: usize,
    /// Time between SIGTERM and SIGKILL.
    pub kill_grace: Duration,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("sh"),
            max_timeout: Duration::from_secs(3600),
            max_output_bytes: 4 * 1024 * 1024,
            kill_grace: Duration::from_secs(2),
        }
    }
}

/// Spawns commands inside the workspace. Holds no per-call state, so one
/// runner is shared by all concurrent requests.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    workspace: Arc<Workspace>,
    limits: ExecLimits,
}

/// Bytes captured from one stream, plus how many were dropped past the cap.
#[derive(Debug)]
struct CappedBuffer {
    data: Vec<u8>,
    cap: usize,
    dropped: u64,
}

impl CappedBuffer {
    const fn new(cap: usize) -> Self {
        Self {
            data: Vec::new(),
            cap,
            dropped: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.cap.saturating_sub(self.data.len());
        let keep = room.min(chunk.len());
        self.data.extend_from_slice(&chunk[..keep]);
        self.dropped += (chunk.len() - keep) as u64;
    }
}

type SharedBuffer = Arc<Mutex<CappedBuffer>>;

impl ProcessRunner {
    #[must_use]
    pub const fn new(workspace: Arc<Workspace>, limits: ExecLimits) -> Self {
        Self { workspace, limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &ExecLimits {
        &self.limits
    }

    /// Run `params.command` and wait for it, bounded by the timeout.
    ///
    /// A non-zero exit and a timeout are both successful calls; only
    /// path and spawn failures are errors.
    pub async fn run(&self, params: &ExecParams) -> AgentResult<CommandResult> {
        if params.timeout_seconds == 0 {
            return Err(AgentError::InvalidArgument(
                "timeoutSeconds must be at least 1".to_owned(),
            ));
        }
        let timeout = Duration::from_secs(params.timeout_seconds).min(self.limits.max_timeout);

        let cwd = self.resolve_cwd(params.cwd.as_deref())?;
        info!(
            command = params.command,
            cwd = %self.workspace.relativize(&cwd).display(),
            timeout_secs = timeout.as_secs(),
            "exec request"
        );

        let started = Instant::now();
        let deadline = started + timeout;

        let mut cmd = Command::new(&self.limits.shell);
        cmd.arg("-c")
            .arg(&params.command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            error!(command = params.command, error = %e, "failed to spawn command");
            AgentError::Internal(format!("failed to spawn {}: {e}", self.limits.shell.display()))
        })?;
        // The group id outlives the leader, so keep it for killing descendants.
        let pgid = child.id().and_then(|id| i32::try_from(id).ok());

        let cap = self.limits.max_output_bytes;
        let stdout_buf: SharedBuffer = Arc::new(Mutex::new(CappedBuffer::new(cap)));
        let stderr_buf: SharedBuffer = Arc::new(Mutex::new(CappedBuffer::new(cap)));
        let mut drains = JoinSet::new();
        if let Some(out) = child.stdout.take() {
            drains.spawn(drain(out, Arc::clone(&stdout_buf)));
        }
        if let Some(err) = child.stderr.take() {
            drains.spawn(drain(err, Arc::clone(&stderr_buf)));
        }

        let (status, timed_out) = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => {
                let status = status
                    .map_err(|e| AgentError::Internal(format!("failed to wait for child: {e}")))?;
                (Some(status), false)
            }
            Err(_) => {
                error!(
                    command = params.command,
                    timeout_secs = timeout.as_secs(),
                    "exec timeout"
                );
                self.terminate(&mut child, pgid).await;
                (None, true)
            }
        };

        // Background descendants may still hold the pipes open.
        let drain_deadline = if timed_out {
            Instant::now() + self.limits.kill_grace
        } else {
            deadline
        };
        if tokio::time::timeout_at(drain_deadline, join_all(&mut drains)).await.is_err() {
            warn!(
                command = params.command,
                "output pipes still open, killing process group"
            );
            signal_group(pgid, Signal::Kill);
            let grace = self.limits.kill_grace;
            if tokio::time::timeout(grace, join_all(&mut drains)).await.is_err() {
                drains.abort_all();
            }
        }

        let (stdout, stdout_truncated) = take_output(&stdout_buf);
        let (stderr, stderr_truncated) = take_output(&stderr_buf);
        let exit_code = status.map_or(TIMEOUT_EXIT_CODE, exit_code_of);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            exit_code,
            timed_out,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            duration_ms,
            "exec response"
        );

        Ok(CommandResult {
            exit_code,
            stdout,
            stderr,
            timed_out,
            stdout_truncated,
            stderr_truncated,
            duration_ms,
        })
    }

    fn resolve_cwd(&self, cwd: Option<&str>) -> AgentResult<PathBuf> {
        let resolved = self.workspace.resolve(cwd.unwrap_or(""))?;
        let meta = std::fs::metadata(resolved.as_path())
            .map_err(|e| AgentError::from_io(resolved.relative(), &e))?;
        if !meta.is_dir() {
            return Err(AgentError::NotADirectory {
                path: resolved.relative().to_path_buf(),
            });
        }
        Ok(resolved.as_path().to_path_buf())
    }

    /// SIGTERM the process group, escalating to SIGKILL after the grace period.
    async fn terminate(&self, child: &mut Child, pgid: Option<i32>) {
        signal_group(pgid, Signal::Term);
        if tokio::time::timeout(self.limits.kill_grace, child.wait()).await.is_ok() {
            return;
        }
        debug!("child ignored SIGTERM, sending SIGKILL");
        signal_group(pgid, Signal::Kill);
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R, sink: SharedBuffer) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink.lock().unwrap_or_else(PoisonError::into_inner).push(&chunk[..n]),
        }
    }
}

async fn join_all(set: &mut JoinSet<()>) {
    while set.join_next().await.is_some() {}
}

fn take_output(buf: &SharedBuffer) -> (String, bool) {
    let mut guard = buf.lock().unwrap_or_else(PoisonError::into_inner);
    let data = std::mem::take(&mut guard.data);
    (String::from_utf8_lossy(&data).into_owned(), guard.dropped > 0)
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

/// Signal the child's whole process group (the child is its leader).
#[cfg(unix)]
fn signal_group(pgid: Option<i32>, signal: Signal) {
    use nix::sys::signal::{Signal as NixSignal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pgid else {
        return;
    };
    let signal = match signal {
        Signal::Term => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    if let Err(e) = killpg(Pid::from_raw(pid), signal) {
        debug!(pid, error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
const fn signal_group(_pgid: Option<i32>, _signal: Signal) {}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(TIMEOUT_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(TIMEOUT_EXIT_CODE)
}

/// Resolve `shell` on `PATH` unless it is already a path.
pub fn locate_shell(shell: &Path) -> which::Result<PathBuf> {
    which::which(shell)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner(limits: ExecLimits) -> (tempfile::TempDir, ProcessRunner) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ws = Arc::new(Workspace::new(dir.path()).expect("workspace"));
        (dir, ProcessRunner::new(ws, limits))
    }

    fn params(command: &str) -> ExecParams {
        ExecParams {
            command: command.to_owned(),
            cwd: None,
            timeout_seconds: 120,
        }
    }

    #[tokio::test]
    async fn test_echo_hello() {
        let (_dir, runner) = runner(ExecLimits::default());
        let result = runner.run(&params("echo hello")).await.expect("run");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "");
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_stdout_and_stderr_are_separate() {
        let (_dir, runner) = runner(ExecLimits::default());
        let result = runner
            .run(&params("echo out; echo err 1>&2; exit 3"))
            .await
            .expect("run");
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let (_dir, runner) = runner(ExecLimits::default());
        let started = std::time::Instant::now();
        let mut p = params("sleep 10");
        p.timeout_seconds = 1;
        let result = runner.run(&p).await.expect("run");

        assert!(result.timed_out);
        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_timeout_escalates_to_sigkill() {
        let (_dir, runner) = runner(ExecLimits {
            kill_grace: Duration::from_millis(200),
            ..ExecLimits::default()
        });
        let started = std::time::Instant::now();
        let mut p = params("trap '' TERM; sleep 10");
        p.timeout_seconds = 1;
        let result = runner.run(&p).await.expect("run");

        assert!(result.timed_out);
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_output_is_capped_but_drained() {
        let (_dir, runner) = runner(ExecLimits {
            max_output_bytes: 1024,
            ..ExecLimits::default()
        });
        // 1 MiB of output would block on a full pipe if it were not drained.
        let result = runner
            .run(&params("head -c 1048576 /dev/zero | tr '\\0' 'a'; echo done 1>&2"))
            .await
            .expect("run");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.len(), 1024);
        assert!(result.stdout_truncated);
        assert_eq!(result.stderr, "done\n");
        assert!(!result.stderr_truncated);
    }

    #[tokio::test]
    async fn test_cwd_is_resolved_in_workspace() {
        let (dir, runner) = runner(ExecLimits::default());
        std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
        let mut p = params("pwd");
        p.cwd = Some("sub".to_owned());
        let result = runner.run(&p).await.expect("run");
        let expected = dir.path().canonicalize().expect("canon").join("sub");
        assert_eq!(result.stdout.trim_end(), expected.to_str().expect("utf8"));
    }

    #[tokio::test]
    async fn test_cwd_escape_is_not_executed() {
        let (dir, runner) = runner(ExecLimits::default());
        let marker = dir.path().join("ran");
        let mut p = params(&format!("touch {}", marker.display()));
        p.cwd = Some("../..".to_owned());
        let err = runner.run(&p).await.expect_err("escape");
        assert!(matches!(err, AgentError::PathEscape { .. }));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_cwd_through_escaping_symlink_is_not_executed() {
        let (dir, runner) = runner(ExecLimits::default());
        let outside = tempfile::tempdir().expect("outside");
        std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).expect("symlink");

        let mut p = params("touch ran");
        p.cwd = Some("out".to_owned());
        let err = runner.run(&p).await.expect_err("escape");
        assert!(matches!(err, AgentError::PathEscape { .. }));
        assert!(!outside.path().join("ran").exists());
        assert!(!dir.path().join("ran").exists());
    }

    #[tokio::test]
    async fn test_zero_timeout_is_rejected() {
        let (_dir, runner) = runner(ExecLimits::default());
        let mut p = params("true");
        p.timeout_seconds = 0;
        let err = runner.run(&p).await.expect_err("zero timeout");
        assert!(matches!(err, AgentError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_missing_shell_is_internal_error() {
        let (_dir, runner) = runner(ExecLimits {
            shell: PathBuf::from("/nonexistent/shell"),
            ..ExecLimits::default()
        });
        let err = runner.run(&params("true")).await.expect_err("spawn");
        assert!(matches!(err, AgentError::Internal(_)));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let (_dir, runner) = runner(ExecLimits::default());
        let slow = {
            let runner = runner.clone();
            tokio::spawn(async move {
                let mut p = params("sleep 2; echo slow");
                p.timeout_seconds = 10;
                runner.run(&p).await
            })
        };
        let started = std::time::Instant::now();
        let fast = runner.run(&params("echo fast")).await.expect("fast");
        assert_eq!(fast.stdout, "fast\n");
        assert!(started.elapsed() < Duration::from_secs(2));

        let slow = slow.await.expect("join").expect("slow");
        assert_eq!(slow.stdout, "slow\n");
    }

    #[test]
    fn test_capped_buffer_counts_dropped_bytes() {
        let mut buf = CappedBuffer::new(4);
        buf.push(b"abc");
        buf.push(b"defg");
        assert_eq!(buf.data, b"abcd");
        assert_eq!(buf.dropped, 3);
    }
}
