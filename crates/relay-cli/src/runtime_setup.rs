//! Turns parsed flags into a ready-to-run [`RelayRuntime`].

use std::sync::Arc;

use anyhow::{Context, Result};
use relay_artifacts::{
    ActionsResultsClient, ArtifactStore, DirectoryArtifactStore, GithubArtifactStore,
};
use relay_github::{GithubApiClient, GithubClientConfig};
use relay_runtime::{AgentSettings, RelayRuntime, RuntimeConfig};
use serde_json::Value;

use crate::cli_args::Cli;

pub fn build_runtime(cli: &Cli) -> Result<RelayRuntime> {
    let config = build_runtime_config(cli)?;
    let github = GithubApiClient::new(GithubClientConfig {
        api_base: cli.api_base.clone(),
        token: cli.github_token.clone(),
        repo: cli.repo.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    })?;
    let store = build_artifact_store(cli, &github)?;
    Ok(RelayRuntime::new(config, github, store))
}

pub fn build_runtime_config(cli: &Cli) -> Result<RuntimeConfig> {
    let raw_payload = std::fs::read_to_string(&cli.event_path)
        .with_context(|| format!("failed to read event payload {}", cli.event_path.display()))?;
    let payload: Value = serde_json::from_str(&raw_payload)
        .with_context(|| format!("failed to parse event payload {}", cli.event_path.display()))?;
    let workspace = match cli.workspace.as_ref() {
        Some(workspace) => workspace.clone(),
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    let run_url = workflow_run_id(cli)?
        .map(|run_id| workflow_run_url(&cli.server_url, &cli.repo.as_slug(), run_id));

    Ok(RuntimeConfig {
        event_name: cli.event_name.trim().to_string(),
        payload,
        artifact_prefix: cli.artifact_prefix.trim().to_string(),
        upload_policy: cli.upload_policy,
        runner_temp: cli.runner_temp.clone(),
        workspace,
        agent: AgentSettings {
            binary: cli.agent_bin.clone(),
            api_key: cli.api_key.clone(),
            github_token: cli.github_token.clone(),
            model: non_empty(&cli.model),
            reasoning_effort: non_empty(&cli.reasoning_effort),
        },
        prompt_template: cli
            .prompt_template
            .clone()
            .filter(|path| !path.as_os_str().is_empty()),
        extra_prompt: cli.extra_prompt.clone(),
        run_url,
    })
}

pub fn workflow_run_url(server_url: &str, repo_slug: &str, run_id: u64) -> String {
    format!(
        "{}/{}/actions/runs/{}",
        server_url.trim_end_matches('/'),
        repo_slug,
        run_id
    )
}

fn build_artifact_store(cli: &Cli, github: &GithubApiClient) -> Result<Arc<dyn ArtifactStore>> {
    if let Some(dir) = cli.artifact_dir.as_ref() {
        tracing::info!(dir = %dir.display(), "using directory artifact store");
        return Ok(Arc::new(DirectoryArtifactStore::new(
            dir.clone(),
            workflow_run_id(cli)?,
            cli.artifact_retention_days,
        )));
    }

    let runtime_token = cli.actions_runtime_token.as_deref().and_then(non_empty);
    let results_url = cli.actions_results_url.as_deref().and_then(non_empty);
    let results = match (runtime_token, results_url) {
        (Some(token), Some(url)) => Some(
            ActionsResultsClient::new(&url, &token, cli.request_timeout_ms)
                .context("failed to configure actions results client")?,
        ),
        _ => {
            tracing::warn!("actions runtime token or results url missing; session upload will fail");
            None
        }
    };
    Ok(Arc::new(GithubArtifactStore::new(
        github.clone(),
        results,
        cli.artifact_retention_days,
        cli.runner_temp.clone(),
    )))
}

fn workflow_run_id(cli: &Cli) -> Result<Option<u64>> {
    cli.run_id
        .as_deref()
        .and_then(non_empty)
        .map(|raw| {
            raw.parse::<u64>()
                .with_context(|| format!("invalid workflow run id '{raw}'"))
        })
        .transpose()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
