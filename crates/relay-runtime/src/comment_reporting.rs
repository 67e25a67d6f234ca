//! Posting responses and failure reports back to the subject.

use anyhow::{Context, Result};
use relay_agent::AgentRunError;
use relay_github::issue_comment::{
    render_agent_failure_comment, render_comment_chunks, render_run_error_comment,
    GITHUB_COMMENT_MAX_CHARS,
};
use relay_github::{GithubApiClient, Subject};

/// Posts `body` as one or more consecutive comments, returning how many were created.
pub async fn post_chunked_comment(
    github: &GithubApiClient,
    subject: &Subject,
    body: &str,
) -> Result<usize> {
    let chunks = render_comment_chunks(body, GITHUB_COMMENT_MAX_CHARS);
    for (index, chunk) in chunks.iter().enumerate() {
        github
            .create_issue_comment(subject.number, chunk)
            .await
            .with_context(|| {
                format!(
                    "failed to post comment chunk {}/{} on {subject}",
                    index + 1,
                    chunks.len()
                )
            })?;
    }
    Ok(chunks.len())
}

/// User-visible explanation for a failed run.
pub fn render_failure_body(error: &anyhow::Error, run_url: Option<&str>) -> String {
    match error.downcast_ref::<AgentRunError>() {
        Some(AgentRunError::ProcessExitNonzero { exit_code, output }) => {
            render_agent_failure_comment(*exit_code, output)
        }
        _ => render_run_error_comment(&format!("{error:#}"), run_url),
    }
}
