//! Wire models for the subset of the GitHub REST API the relay consumes.
//!
//! Fields GitHub may omit or null out are `Option`s with `#[serde(default)]`
//! so a sparse payload never fails the whole decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubIssue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub user: Option<GithubUser>,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GithubBranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubPullRequest {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub base: GithubBranchRef,
    pub head: GithubBranchRef,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubIssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub user: Option<GithubUser>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubReviewComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub user: Option<GithubUser>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubCommitDetail {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubCommit {
    pub sha: String,
    #[serde(default)]
    pub commit: Option<GithubCommitDetail>,
    #[serde(default)]
    pub author: Option<GithubUser>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubChangedFile {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub changes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GithubCompare {
    #[serde(default)]
    pub commits: Vec<GithubCommit>,
    #[serde(default)]
    pub files: Vec<GithubChangedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GithubWorkflowRunRef {
    #[serde(default)]
    pub id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GithubArtifact {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub workflow_run: Option<GithubWorkflowRunRef>,
}

impl GithubArtifact {
    pub fn workflow_run_id(&self) -> Option<u64> {
        self.workflow_run
            .as_ref()
            .and_then(|run| run.id)
            .filter(|id| *id > 0)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GithubArtifactPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub artifacts: Vec<GithubArtifact>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubCollaborator {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubCommentCreateResponse {
    pub id: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}
