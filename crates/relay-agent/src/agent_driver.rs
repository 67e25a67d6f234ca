//! Spawns the agent CLI with the session environment and captures its output.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use crate::agent_invocation::{build_exec_args, AgentInvocation};

#[derive(Debug, Clone)]
pub struct AgentDriverConfig {
    pub binary: String,
    /// Live session directory exported as the agent's home and state dir.
    pub session_dir: PathBuf,
    pub workspace: PathBuf,
    pub github_token: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRunReport {
    pub exit_code: i32,
    pub output_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentRunError {
    #[error("failed to spawn agent '{binary}': {reason}")]
    Spawn { binary: String, reason: String },
    #[error("agent io failed: {0}")]
    Io(String),
    #[error("agent process exited with {}", describe_exit(.exit_code))]
    ProcessExitNonzero {
        exit_code: Option<i32>,
        output: String,
    },
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    exit_code
        .as_ref()
        .map(|code| format!("code {code}"))
        .unwrap_or_else(|| "a signal".to_string())
}

#[derive(Debug, Clone)]
pub struct AgentDriver {
    config: AgentDriverConfig,
}

impl AgentDriver {
    pub fn new(config: AgentDriverConfig) -> Result<Self> {
        if config.binary.trim().is_empty() {
            bail!("agent binary is empty");
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &AgentDriverConfig {
        &self.config
    }

    /// Stores the API key in the session through `<agent> login --with-api-key`.
    pub async fn login(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.session_dir).with_context(|| {
            format!("failed to create {}", self.config.session_dir.display())
        })?;
        let mut command = self.command();
        command
            .args(["login", "--with-api-key"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = spawn_with_text_file_busy_retry(&mut command, &self.config.binary)
            .await
            .map_err(anyhow::Error::new)?;
        write_stdin(&mut child, self.config.api_key.as_bytes())
            .await
            .context("failed to send api key to agent login")?;
        let output = child
            .wait_with_output()
            .await
            .context("agent login process failed")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "agent login failed with {}: {}",
                describe_exit(&output.status.code()),
                stderr.trim()
            );
        }
        tracing::debug!("agent login succeeded");
        Ok(())
    }

    /// Runs one agent turn with `prompt` on stdin, streaming stdout and stderr into `output_path`.
    pub async fn run(
        &self,
        invocation: &AgentInvocation,
        prompt: &str,
        output_path: &Path,
    ) -> Result<AgentRunReport, AgentRunError> {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                AgentRunError::Io(format!("failed to create {}: {error}", parent.display()))
            })?;
        }
        let output_file = std::fs::File::create(output_path).map_err(|error| {
            AgentRunError::Io(format!("failed to create {}: {error}", output_path.display()))
        })?;
        let stderr_file = output_file.try_clone().map_err(|error| {
            AgentRunError::Io(format!("failed to share {}: {error}", output_path.display()))
        })?;

        let args = build_exec_args(invocation);
        tracing::info!(
            binary = %self.config.binary,
            resume = invocation.resume,
            args = %args.join(" "),
            "starting agent"
        );
        let mut command = self.command();
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(output_file))
            .stderr(Stdio::from(stderr_file));
        let mut child = spawn_with_text_file_busy_retry(&mut command, &self.config.binary).await?;
        write_stdin(&mut child, prompt.as_bytes())
            .await
            .map_err(|error| AgentRunError::Io(format!("failed to write prompt: {error}")))?;
        let status = child
            .wait()
            .await
            .map_err(|error| AgentRunError::Io(format!("failed to wait for agent: {error}")))?;

        match status.code() {
            Some(0) => Ok(AgentRunReport {
                exit_code: 0,
                output_path: output_path.to_path_buf(),
            }),
            exit_code => {
                let output = std::fs::read(output_path)
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .unwrap_or_default();
                Err(AgentRunError::ProcessExitNonzero { exit_code, output })
            }
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.config.binary);
        command
            .current_dir(&self.config.workspace)
            .env("CODEX_HOME", &self.config.session_dir)
            .env("CODEX_STATE_DIR", &self.config.session_dir)
            .env("CODEX_SESSIONS_PATH", self.config.session_dir.join("sessions"))
            .env("GITHUB_TOKEN", &self.config.github_token)
            .env("OPENAI_API_KEY", &self.config.api_key)
            .kill_on_drop(true);
        command
    }
}

async fn write_stdin(child: &mut Child, input: &[u8]) -> std::io::Result<()> {
    let Some(mut stdin) = child.stdin.take() else {
        return Err(std::io::Error::other("missing stdin pipe"));
    };
    match stdin.write_all(input).await {
        // the agent may exit without draining stdin; its exit status tells the story
        Err(error) if error.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }?;
    stdin.shutdown().await.or_else(|error| {
        if error.kind() == std::io::ErrorKind::BrokenPipe {
            Ok(())
        } else {
            Err(error)
        }
    })
}

async fn spawn_with_text_file_busy_retry(
    command: &mut Command,
    binary: &str,
) -> Result<Child, AgentRunError> {
    const MAX_TEXT_FILE_BUSY_RETRIES: u32 = 5;
    const TEXT_FILE_BUSY_ERRNO: i32 = 26;
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(error)
                if error.raw_os_error() == Some(TEXT_FILE_BUSY_ERRNO)
                    && attempt < MAX_TEXT_FILE_BUSY_RETRIES =>
            {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            Err(error) => {
                return Err(AgentRunError::Spawn {
                    binary: binary.to_string(),
                    reason: error.to_string(),
                })
            }
        }
    }
}
