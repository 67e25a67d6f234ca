use std::path::PathBuf;

use clap::Parser;
use relay_github::RepoRef;
use relay_runtime::UploadPolicy;

fn parse_repo_slug(value: &str) -> Result<RepoRef, String> {
    RepoRef::parse(value).map_err(|error| error.to_string())
}

fn parse_upload_policy(value: &str) -> Result<UploadPolicy, String> {
    UploadPolicy::parse(value).map_err(|error| error.to_string())
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

/// Settings for one relay run. Every flag falls back to the variable a
/// GitHub Actions runner provides, so the binary needs no flags inside a workflow.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "relay-action",
    about = "Resume a coding agent session for a GitHub issue or pull request",
    version
)]
pub struct Cli {
    #[arg(long = "event-name", env = "GITHUB_EVENT_NAME")]
    pub event_name: String,

    #[arg(
        long = "event-path",
        env = "GITHUB_EVENT_PATH",
        help = "Path to the JSON payload of the triggering event"
    )]
    pub event_path: PathBuf,

    #[arg(long, env = "GITHUB_REPOSITORY", value_parser = parse_repo_slug)]
    pub repo: RepoRef,

    #[arg(
        long = "api-base",
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com"
    )]
    pub api_base: String,

    #[arg(
        long = "server-url",
        env = "GITHUB_SERVER_URL",
        default_value = "https://github.com"
    )]
    pub server_url: String,

    #[arg(long = "run-id", env = "GITHUB_RUN_ID")]
    pub run_id: Option<String>,

    #[arg(long = "github-token", env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    #[arg(long = "api-key", env = "INPUT_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(
        long,
        env = "INPUT_MODEL",
        default_value = "",
        help = "Agent model; empty keeps the agent default"
    )]
    pub model: String,

    #[arg(long = "reasoning-effort", env = "INPUT_REASONING_EFFORT", default_value = "")]
    pub reasoning_effort: String,

    #[arg(long = "agent-bin", env = "RELAY_AGENT_BIN", default_value = "codex")]
    pub agent_bin: String,

    #[arg(long = "runner-temp", env = "RUNNER_TEMP", default_value = "/tmp")]
    pub runner_temp: PathBuf,

    #[arg(
        long,
        env = "GITHUB_WORKSPACE",
        help = "Checked-out repository the agent works in; defaults to the current directory"
    )]
    pub workspace: Option<PathBuf>,

    #[arg(
        long = "artifact-prefix",
        env = "INPUT_ARTIFACT_PREFIX",
        default_value = "action-agent"
    )]
    pub artifact_prefix: String,

    #[arg(
        long = "artifact-retention-days",
        env = "INPUT_ARTIFACT_RETENTION_DAYS",
        default_value = "7",
        value_parser = parse_positive_u32
    )]
    pub artifact_retention_days: u32,

    #[arg(
        long = "upload-policy",
        env = "INPUT_UPLOAD_POLICY",
        default_value = "success-only",
        value_parser = parse_upload_policy,
        help = "When to upload the session: success-only or always"
    )]
    pub upload_policy: UploadPolicy,

    #[arg(long = "prompt-template", env = "INPUT_PROMPT_TEMPLATE")]
    pub prompt_template: Option<PathBuf>,

    #[arg(
        long = "extra-prompt",
        env = "INPUT_PROMPT",
        default_value = "",
        help = "Additional instructions appended to the rendered prompt"
    )]
    pub extra_prompt: String,

    #[arg(
        long = "request-timeout-ms",
        env = "RELAY_REQUEST_TIMEOUT_MS",
        default_value = "30000",
        value_parser = parse_positive_u64
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "RELAY_RETRY_MAX_ATTEMPTS",
        default_value = "1",
        value_parser = parse_positive_usize
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "RELAY_RETRY_BASE_DELAY_MS",
        default_value = "500",
        value_parser = parse_positive_u64
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "actions-runtime-token",
        env = "ACTIONS_RUNTIME_TOKEN",
        hide_env_values = true
    )]
    pub actions_runtime_token: Option<String>,

    #[arg(long = "actions-results-url", env = "ACTIONS_RESULTS_URL")]
    pub actions_results_url: Option<String>,

    #[arg(
        long = "artifact-dir",
        env = "RELAY_ARTIFACT_DIR",
        help = "Keep session artifacts in this directory instead of GitHub Actions artifacts"
    )]
    pub artifact_dir: Option<PathBuf>,
}
