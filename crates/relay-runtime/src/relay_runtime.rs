//! One run: resolve, gate, restore, delta, agent, persist, reply.

use std::sync::Arc;

use anyhow::{Context, Result};
use relay_agent::{
    extract_agent_response, load_prompt_template, render_prompt, AgentDriver, AgentDriverConfig,
    AgentInvocation, AgentRunError, PromptContext,
};
use relay_artifacts::ArtifactStore;
use relay_delta::{build_delta, DeltaRequest};
use relay_github::subject::{comment_author_login, reaction_target};
use relay_github::{resolve_subject, EventKind, GithubApiClient, Subject};
use relay_session::{
    install_skills, prepare_fresh_session, restore_session, strip_credentials, SessionPaths,
    SessionState,
};

use crate::comment_reporting::{post_chunked_comment, render_failure_body};
use crate::runtime_config::{RuntimeConfig, UploadPolicy};

const ACK_REACTION: &str = "eyes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Skipped {
        reason: String,
    },
    Completed {
        subject: Subject,
        resumed: bool,
        uploaded: bool,
        response_chars: usize,
    },
}

pub struct RelayRuntime {
    config: RuntimeConfig,
    github: GithubApiClient,
    store: Arc<dyn ArtifactStore>,
}

impl RelayRuntime {
    pub fn new(config: RuntimeConfig, github: GithubApiClient, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            config,
            github,
            store,
        }
    }

    /// Runs the event end to end. Failures after subject resolution are reported
    /// on the subject before being returned.
    pub async fn run(&self) -> Result<RunOutcome> {
        let subject = resolve_subject(&self.config.event_name, &self.config.payload)?;
        tracing::info!(
            event = %self.config.event_name,
            action = self.config.event_action().unwrap_or(""),
            %subject,
            "resolved subject"
        );
        match self.run_for_subject(subject).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.report_failure(&subject, &error).await;
                Err(error)
            }
        }
    }

    async fn run_for_subject(&self, subject: Subject) -> Result<RunOutcome> {
        let kind = EventKind::from_name(&self.config.event_name)
            .with_context(|| format!("unsupported event: {}", self.config.event_name))?;
        let comment_author = comment_author_login(kind, &self.config.payload)?;
        let (token_login, collaborators) = tokio::try_join!(
            self.github.resolve_token_login(),
            self.github.list_collaborator_logins()
        )?;
        if let Some(author) = comment_author {
            if author.eq_ignore_ascii_case(&token_login) {
                return Ok(skipped(format!(
                    "comment authored by the relay identity '{token_login}'"
                )));
            }
            if !collaborators
                .iter()
                .any(|login| login.eq_ignore_ascii_case(author))
            {
                return Ok(skipped(format!(
                    "comment author '{author}' is not a trusted collaborator"
                )));
            }
        }

        let target = reaction_target(kind, &self.config.payload, &subject);
        if let Err(error) = self.github.create_reaction(target, ACK_REACTION).await {
            tracing::warn!(%subject, error = %format!("{error:#}"), "failed to add reaction");
        }

        let artifact_name = subject.artifact_name(&self.config.artifact_prefix);
        let latest = self.store.find_latest(&artifact_name).await?;
        let paths = SessionPaths::under(&self.config.runner_temp);
        let resumed = match latest.as_ref() {
            Some(artifact) => {
                tracing::info!(
                    artifact = %artifact_name,
                    artifact_id = artifact.id,
                    "resuming from session artifact"
                );
                restore_session(self.store.as_ref(), artifact, &paths).await?;
                true
            }
            None => {
                tracing::info!(artifact = %artifact_name, "no session artifact found; starting fresh");
                prepare_fresh_session(&paths)?;
                false
            }
        };
        let skills = install_skills(&self.config.workspace, &paths.session_dir)?;
        if skills > 0 {
            tracing::debug!(files = skills, "installed workspace skills");
        }

        let state_path = paths.state_path();
        let previous = SessionState::load(&state_path)?;
        let delta = build_delta(
            &self.github,
            DeltaRequest {
                event_name: &self.config.event_name,
                event_action: self.config.event_action(),
                payload: &self.config.payload,
                subject,
                previous: previous.as_ref(),
            },
        )
        .await?;
        tracing::info!(
            had_state = previous.is_some(),
            new_comments = delta.summary.new_comments,
            new_review_comments = delta.summary.new_review_comments,
            commits = delta.summary.commits,
            files = delta.summary.files,
            "built delta"
        );

        let template = load_prompt_template(self.config.prompt_template.as_deref())?;
        let prompt = render_prompt(
            &template,
            &PromptContext {
                event_name: &self.config.event_name,
                event_action: self.config.event_action(),
                subject_type: subject.subject_type.as_str(),
                subject_number: subject.number,
                subject_url: &delta.subject_url,
                delta_json: &delta.delta_json,
                extra_prompt: &self.config.extra_prompt,
            },
        );

        let driver = AgentDriver::new(AgentDriverConfig {
            binary: self.config.agent.binary.clone(),
            session_dir: paths.session_dir.clone(),
            workspace: self.config.workspace.clone(),
            github_token: self.config.agent.github_token.clone(),
            api_key: self.config.agent.api_key.clone(),
        })?;
        let invocation = AgentInvocation {
            model: self.config.agent.model.clone(),
            reasoning_effort: self.config.agent.reasoning_effort.clone(),
            resume: resumed,
        };
        let output_path = self.config.agent_output_path();
        let login = driver.login().await;
        let run = match login {
            Ok(()) => driver
                .run(&invocation, &prompt, &output_path)
                .await
                .map_err(anyhow::Error::new),
            Err(error) => Err(error),
        };
        let stripped = strip_credentials(&paths.session_dir)?;
        tracing::debug!(removed = stripped.len(), "stripped credentials from session");

        let report = match run {
            Ok(report) => report,
            Err(error) => {
                let agent_exited = matches!(
                    error.downcast_ref::<AgentRunError>(),
                    Some(AgentRunError::ProcessExitNonzero { .. })
                );
                if agent_exited && self.config.upload_policy == UploadPolicy::Always {
                    match self.store.upload(&artifact_name, &paths.session_dir).await {
                        Ok(receipt) => tracing::info!(
                            artifact = %artifact_name,
                            artifact_id = receipt.artifact_id,
                            "uploaded session after failed agent run"
                        ),
                        Err(upload_error) => tracing::warn!(
                            artifact = %artifact_name,
                            error = %format!("{upload_error:#}"),
                            "failed to upload session after failed agent run"
                        ),
                    }
                }
                return Err(error);
            }
        };
        tracing::info!(exit_code = report.exit_code, "agent finished");

        let response = extract_agent_response(&report.output_path);
        delta.next_state.save(&state_path)?;
        let receipt = self
            .store
            .upload(&artifact_name, &paths.session_dir)
            .await
            .with_context(|| format!("failed to upload session artifact {artifact_name}"))?;
        tracing::info!(
            artifact = %artifact_name,
            artifact_id = receipt.artifact_id,
            files = receipt.files,
            "persisted session"
        );

        let response_chars = response.chars().count();
        let comments = post_chunked_comment(&self.github, &subject, &response).await?;
        tracing::info!(%subject, comments, chars = response_chars, "posted response");
        Ok(RunOutcome::Completed {
            subject,
            resumed,
            uploaded: true,
            response_chars,
        })
    }

    async fn report_failure(&self, subject: &Subject, error: &anyhow::Error) {
        let body = render_failure_body(error, self.config.run_url.as_deref());
        if let Err(post_error) = post_chunked_comment(&self.github, subject, &body).await {
            tracing::warn!(
                %subject,
                error = %format!("{post_error:#}"),
                "failed to post failure comment"
            );
        }
    }
}

fn skipped(reason: String) -> RunOutcome {
    tracing::info!(%reason, "skipping run");
    RunOutcome::Skipped { reason }
}
