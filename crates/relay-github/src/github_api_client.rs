use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use crate::github_transport_helpers::{
    is_retryable_github_response, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};
use crate::models::{
    GithubArtifactPage, GithubCollaborator, GithubCommentCreateResponse, GithubCommit,
    GithubCompare, GithubIssue, GithubIssueComment, GithubPullRequest, GithubReviewComment,
};

const GITHUB_PAGE_SIZE: usize = 100;
/// Login reported for the workflow installation token, which cannot call `GET /user`.
pub const ACTIONS_BOT_LOGIN: &str = "github-actions[bot]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid repository '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid repository '{raw}', expected owner/repo");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct GithubClientConfig {
    pub api_base: String,
    pub token: String,
    pub repo: RepoRef,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

/// What an acknowledgement reaction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    Issue(u64),
    IssueComment(u64),
    ReviewComment(u64),
}

#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    pub fn new(config: GithubClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("relay-session-agent"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", config.token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            repo: config.repo,
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base,
            self.repo.owner,
            self.repo.name,
            suffix.trim_start_matches('/')
        )
    }

    /// Resolves the login behind the configured token.
    pub async fn resolve_token_login(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct Viewer {
            login: String,
        }

        let response = self
            .http
            .get(format!("{}/user", self.api_base))
            .send()
            .await
            .context("github api resolve token login request failed")?;
        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            return Ok(ACTIONS_BOT_LOGIN.to_string());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "github api resolve token login failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 800)
            );
        }
        let viewer = response
            .json::<Viewer>()
            .await
            .context("failed to decode github resolve token login")?;
        Ok(viewer.login)
    }

    /// Lists logins of collaborators holding at least push permission.
    pub async fn list_collaborator_logins(&self) -> Result<Vec<String>> {
        let url = self.repo_url("collaborators");
        let rows: Vec<GithubCollaborator> = self
            .paginate("list collaborators", &url, &[("permission", "push")])
            .await?;
        Ok(rows.into_iter().map(|row| row.login).collect())
    }

    pub async fn get_issue(&self, issue_number: u64) -> Result<GithubIssue> {
        let url = self.repo_url(&format!("issues/{issue_number}"));
        self.request_json("get issue", || self.http.get(&url)).await
    }

    pub async fn get_pull_request(&self, pull_number: u64) -> Result<GithubPullRequest> {
        let url = self.repo_url(&format!("pulls/{pull_number}"));
        self.request_json("get pull request", || self.http.get(&url))
            .await
    }

    /// Lists issue comments created or updated at or after `since` (RFC3339).
    pub async fn list_issue_comments_since(
        &self,
        issue_number: u64,
        since: &str,
    ) -> Result<Vec<GithubIssueComment>> {
        let url = self.repo_url(&format!("issues/{issue_number}/comments"));
        self.paginate("list issue comments", &url, &[("since", since)])
            .await
    }

    /// Lists pull request review comments updated at or after `since` (RFC3339).
    pub async fn list_review_comments_since(
        &self,
        pull_number: u64,
        since: &str,
    ) -> Result<Vec<GithubReviewComment>> {
        let url = self.repo_url(&format!("pulls/{pull_number}/comments"));
        self.paginate(
            "list review comments",
            &url,
            &[("since", since), ("sort", "created"), ("direction", "asc")],
        )
        .await
    }

    pub async fn compare_commits(&self, base: &str, head: &str) -> Result<GithubCompare> {
        let url = self.repo_url(&format!("compare/{base}...{head}"));
        self.request_json("compare commits", || self.http.get(&url))
            .await
    }

    /// Lists every commit on a pull request, oldest first.
    pub async fn list_pull_request_commits(&self, pull_number: u64) -> Result<Vec<GithubCommit>> {
        let url = self.repo_url(&format!("pulls/{pull_number}/commits"));
        self.paginate("list pull request commits", &url, &[]).await
    }

    pub async fn create_issue_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<GithubCommentCreateResponse> {
        let payload = json!({ "body": body });
        let url = self.repo_url(&format!("issues/{issue_number}/comments"));
        self.request_json("create issue comment", || {
            self.http.post(&url).json(&payload)
        })
        .await
    }

    pub async fn create_reaction(&self, target: ReactionTarget, content: &str) -> Result<()> {
        let url = match target {
            ReactionTarget::Issue(number) => self.repo_url(&format!("issues/{number}/reactions")),
            ReactionTarget::IssueComment(id) => {
                self.repo_url(&format!("issues/comments/{id}/reactions"))
            }
            ReactionTarget::ReviewComment(id) => {
                self.repo_url(&format!("pulls/comments/{id}/reactions"))
            }
        };
        let payload = json!({ "content": content });
        let _: Value = self
            .request_json("create reaction", || self.http.post(&url).json(&payload))
            .await?;
        Ok(())
    }

    /// Fetches one page of repository artifacts filtered by exact name.
    pub async fn list_artifacts_page(
        &self,
        name: &str,
        page: u32,
        per_page: usize,
    ) -> Result<GithubArtifactPage> {
        let url = self.repo_url("actions/artifacts");
        let page_value = page.to_string();
        let per_page_value = per_page.to_string();
        self.request_json("list artifacts", || {
            self.http.get(&url).query(&[
                ("name", name),
                ("per_page", per_page_value.as_str()),
                ("page", page_value.as_str()),
            ])
        })
        .await
    }

    /// Streams an artifact's zip archive into `destination`, returning the byte count.
    pub async fn download_artifact_zip(&self, artifact_id: u64, destination: &Path) -> Result<u64> {
        let url = self.repo_url(&format!("actions/artifacts/{artifact_id}/zip"));
        let response = self
            .send_with_retry("download artifact", || self.http.get(&url))
            .await?;
        let mut file = tokio::fs::File::create(destination)
            .await
            .with_context(|| format!("failed to create {}", destination.display()))?;
        let mut written = 0_u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("failed to read github download artifact body")?;
            file.write_all(&chunk)
                .await
                .with_context(|| format!("failed to write {}", destination.display()))?;
            written = written.saturating_add(chunk.len() as u64);
        }
        file.flush()
            .await
            .with_context(|| format!("failed to flush {}", destination.display()))?;
        Ok(written)
    }

    async fn paginate<T>(&self, operation: &str, url: &str, query: &[(&str, &str)]) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        let per_page_value = GITHUB_PAGE_SIZE.to_string();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<T> = self
                .request_json(operation, || {
                    self.http.get(url).query(query).query(&[
                        ("per_page", per_page_value.as_str()),
                        ("page", page_value.as_str()),
                    ])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < GITHUB_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode github {operation}"))
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        mut request_builder: F,
    ) -> Result<reqwest::Response>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header("x-relay-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retry_after = parse_retry_after(response.headers(), unix_now_secs());
                    let retryable =
                        is_retryable_github_response(status.as_u16(), response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && retryable {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "github api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }
}

fn unix_now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
