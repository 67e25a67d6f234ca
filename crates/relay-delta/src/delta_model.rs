//! Serialized shape of the delta handed to the agent.
//!
//! Top-level keys are camelCase and appear in declaration order; absent
//! sections are omitted entirely, while absent scalar fields inside a section
//! serialize as `null`. Subject details keep GitHub's snake_case field names.

use relay_github::models::{
    GithubChangedFile, GithubCommit, GithubIssue, GithubIssueComment, GithubPullRequest,
    GithubReviewComment,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    pub event: EventInfo,
    pub subject: SubjectInfo,
    pub subject_details: SubjectDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_issue: Option<EventIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_comment: Option<CommentEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_pull_request: Option<EventPullRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_review_comment: Option<ReviewCommentEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_review: Option<EventReview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_comments: Option<Vec<CommentEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_review_comments: Option<Vec<ReviewCommentEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_changes: Option<CommitChanges>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventInfo {
    pub name: String,
    pub action: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectInfo {
    #[serde(rename = "type")]
    pub subject_type: String,
    pub number: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SubjectDetails {
    Issue(IssueDetails),
    PullRequest(PullRequestDetails),
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueDetails {
    pub html_url: String,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub updated_at: Option<String>,
}

impl From<&GithubIssue> for IssueDetails {
    fn from(issue: &GithubIssue) -> Self {
        Self {
            html_url: issue.html_url.clone(),
            title: issue.title.clone(),
            body: issue.body.clone(),
            state: issue.state.clone(),
            updated_at: issue.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchDetails {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PullRequestDetails {
    pub html_url: String,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub draft: bool,
    pub updated_at: Option<String>,
    pub base: BranchDetails,
    pub head: BranchDetails,
}

impl From<&GithubPullRequest> for PullRequestDetails {
    fn from(pr: &GithubPullRequest) -> Self {
        Self {
            html_url: pr.html_url.clone(),
            title: pr.title.clone(),
            body: pr.body.clone(),
            state: pr.state.clone(),
            draft: pr.draft,
            updated_at: pr.updated_at.clone(),
            base: BranchDetails {
                ref_name: pr.base.ref_name.clone(),
                sha: None,
            },
            head: BranchDetails {
                ref_name: pr.head.ref_name.clone(),
                sha: Some(pr.head.sha.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventIssue {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub state: Option<String>,
}

impl EventIssue {
    pub fn from_payload(issue: &Value) -> Self {
        Self {
            title: str_field(issue, "title"),
            body: str_field(issue, "body"),
            url: str_field(issue, "html_url"),
            state: str_field(issue, "state"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPullRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub state: Option<String>,
    pub draft: bool,
    pub head: Option<String>,
    pub base: Option<String>,
}

impl EventPullRequest {
    pub fn from_payload(pr: &Value) -> Self {
        Self {
            title: str_field(pr, "title"),
            body: str_field(pr, "body"),
            url: str_field(pr, "html_url"),
            state: str_field(pr, "state"),
            draft: pr.get("draft").and_then(Value::as_bool).unwrap_or(false),
            head: pr.get("head").and_then(|head| str_field(head, "sha")),
            base: pr.get("base").and_then(|base| str_field(base, "ref")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventReview {
    pub state: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
}

impl EventReview {
    pub fn from_payload(review: &Value) -> Self {
        Self {
            state: str_field(review, "state"),
            body: str_field(review, "body"),
            url: str_field(review, "html_url"),
            author: review.get("user").and_then(|user| str_field(user, "login")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentEntry {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub url: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&GithubIssueComment> for CommentEntry {
    fn from(comment: &GithubIssueComment) -> Self {
        Self {
            id: comment.id,
            author: author_or_unknown(comment.user.as_ref().map(|user| user.login.as_str())),
            body: comment.body.clone().unwrap_or_default(),
            url: comment.html_url.clone().unwrap_or_default(),
            created_at: comment.created_at.clone(),
            updated_at: comment.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewCommentEntry {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub url: String,
    pub path: Option<String>,
    pub line: Option<u64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&GithubReviewComment> for ReviewCommentEntry {
    fn from(comment: &GithubReviewComment) -> Self {
        Self {
            id: comment.id,
            author: author_or_unknown(comment.user.as_ref().map(|user| user.login.as_str())),
            body: comment.body.clone().unwrap_or_default(),
            url: comment.html_url.clone().unwrap_or_default(),
            path: comment.path.clone(),
            line: comment.line,
            created_at: comment.created_at.clone(),
            updated_at: comment.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitEntry {
    pub sha: String,
    pub message: String,
    pub author: Option<String>,
}

impl From<&GithubCommit> for CommitEntry {
    fn from(commit: &GithubCommit) -> Self {
        Self {
            sha: commit.sha.clone(),
            message: commit
                .commit
                .as_ref()
                .and_then(|detail| detail.message.clone())
                .unwrap_or_default(),
            author: commit.author.as_ref().map(|author| author.login.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub filename: String,
    pub status: String,
    pub changes: Option<u64>,
}

impl From<&GithubChangedFile> for FileEntry {
    fn from(file: &GithubChangedFile) -> Self {
        Self {
            filename: file.filename.clone().unwrap_or_default(),
            status: file.status.clone().unwrap_or_default(),
            changes: file.changes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    pub commits: Vec<CommitEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}

fn author_or_unknown(login: Option<&str>) -> String {
    login.unwrap_or("unknown").to_string()
}
