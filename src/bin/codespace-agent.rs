//! codespace-agent -- HTTP command/file agent confined to one workspace.
//!
//! Usage: codespace-agent --workspace <path> [--bind 127.0.0.1:8000]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use codespace_agent::tools::exec::{ExecLimits, locate_shell};
use codespace_agent::AgentConfig;

#[derive(Debug, Parser)]
#[command(name = "codespace-agent")]
#[command(version)]
#[command(about = "Remote command execution and file operations confined to a workspace")]
struct Cli {
    /// Workspace root every path is resolved against
    #[arg(long, env = "CODESPACE_AGENT_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Address to listen on
    #[arg(long, env = "CODESPACE_AGENT_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Shell used to run commands
    #[arg(long, env = "CODESPACE_AGENT_SHELL", default_value = "sh")]
    shell: PathBuf,

    /// Largest accepted command timeout, in seconds
    #[arg(long, env = "CODESPACE_AGENT_MAX_TIMEOUT_SECS", default_value_t = 3600)]
    max_timeout_secs: u64,

    /// Per-stream output capture limit, in bytes
    #[arg(long, env = "CODESPACE_AGENT_MAX_OUTPUT_BYTES", default_value_t = 4 * 1024 * 1024)]
    max_output_bytes: usize,

    /// Delay between SIGTERM and SIGKILL for timed-out commands, in milliseconds
    #[arg(long, env = "CODESPACE_AGENT_KILL_GRACE_MS", default_value_t = 2000)]
    kill_grace_ms: u64,

    /// Origin allowed by CORS (repeatable, or comma-separated in the env var)
    #[arg(
        long = "cors-origin",
        env = "CODESPACE_AGENT_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    cors_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let shell = locate_shell(&cli.shell)
        .with_context(|| format!("shell {} not found", cli.shell.display()))?;

    let config = AgentConfig {
        workspace: cli.workspace,
        bind: cli.bind,
        limits: ExecLimits {
            shell,
            max_timeout: Duration::from_secs(cli.max_timeout_secs.max(1)),
            max_output_bytes: cli.max_output_bytes,
            kill_grace: Duration::from_millis(cli.kill_grace_ms),
        },
        cors_origins: cli.cors_origins,
    };

    codespace_agent::run_server(config).await
}
