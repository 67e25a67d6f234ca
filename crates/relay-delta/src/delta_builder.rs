//! Builds the per-run delta and the next session state snapshot.

use anyhow::{Context, Result};
use relay_core::current_rfc3339_timestamp;
use relay_github::models::{GithubIssueComment, GithubReviewComment};
use relay_github::{EventKind, Subject};
use relay_session::SessionState;
use serde_json::Value;

use crate::activity_source::SubjectActivitySource;
use crate::delta_model::{
    CommentEntry, CommitChanges, CommitEntry, Delta, EventInfo, EventIssue, EventPullRequest,
    EventReview, FileEntry, IssueDetails, PullRequestDetails, ReviewCommentEntry, SubjectDetails,
    SubjectInfo,
};

/// Cap on comments, review comments, commits and files carried in one delta.
pub const MAX_ITEMS: usize = 20;
/// Commits seeded as context the first time a pull request is seen.
pub const BASELINE_COMMIT_COUNT: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct DeltaRequest<'a> {
    pub event_name: &'a str,
    pub event_action: Option<&'a str>,
    pub payload: &'a Value,
    pub subject: Subject,
    pub previous: Option<&'a SessionState>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaSummary {
    pub new_comments: usize,
    pub new_review_comments: usize,
    pub commits: usize,
    pub files: usize,
}

#[derive(Debug, Clone)]
pub struct DeltaOutcome {
    pub delta_json: String,
    pub subject_url: String,
    pub next_state: SessionState,
    pub summary: DeltaSummary,
}

pub async fn build_delta(
    source: &dyn SubjectActivitySource,
    request: DeltaRequest<'_>,
) -> Result<DeltaOutcome> {
    let run_started_at = current_rfc3339_timestamp();
    let DeltaRequest {
        event_name,
        event_action,
        payload,
        subject,
        previous,
    } = request;

    let (subject_url, subject_details, head_sha) = if subject.is_pull_request() {
        let pr = source
            .fetch_pull_request(subject.number)
            .await
            .with_context(|| format!("failed to load {subject}"))?;
        (
            pr.html_url.clone(),
            SubjectDetails::PullRequest(PullRequestDetails::from(&pr)),
            Some(pr.head.sha.clone()),
        )
    } else {
        let issue = source
            .fetch_issue(subject.number)
            .await
            .with_context(|| format!("failed to load {subject}"))?;
        (
            issue.html_url.clone(),
            SubjectDetails::Issue(IssueDetails::from(&issue)),
            None,
        )
    };

    let mut delta = Delta {
        event: EventInfo {
            name: event_name.to_string(),
            action: event_action.map(ToOwned::to_owned),
            actor: payload
                .get("sender")
                .and_then(|sender| sender.get("login"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        },
        subject: SubjectInfo {
            subject_type: subject.subject_type.as_str().to_string(),
            number: subject.number,
            url: subject_url.clone(),
        },
        subject_details,
        event_issue: None,
        event_comment: None,
        event_pull_request: None,
        event_review_comment: None,
        event_review: None,
        new_comments: None,
        new_review_comments: None,
        commit_changes: None,
    };
    apply_event_excerpt(&mut delta, event_name, payload);

    let since = previous.map(|state| state.last_run_at.as_str());
    let issue_comments = match since {
        Some(since) => source
            .list_issue_comments_since(subject.number, since)
            .await
            .with_context(|| format!("failed to list new comments on {subject}"))?,
        None => Vec::new(),
    };
    let review_comments = match since {
        Some(since) if subject.is_pull_request() => source
            .list_review_comments_since(subject.number, since)
            .await
            .with_context(|| format!("failed to list new review comments on {subject}"))?,
        _ => Vec::new(),
    };

    let recent_comments = most_recent_issue_comments(&issue_comments);
    if !recent_comments.is_empty() {
        delta.new_comments = Some(recent_comments);
    }
    let recent_review_comments = most_recent_review_comments(&review_comments);
    if !recent_review_comments.is_empty() {
        delta.new_review_comments = Some(recent_review_comments);
    }

    if let Some(current_sha) = head_sha.as_deref() {
        delta.commit_changes = commit_changes(
            source,
            subject,
            previous.and_then(|state| state.last_head_sha.as_deref()),
            current_sha,
        )
        .await?;
    }

    let next_state = SessionState {
        subject_type: subject.subject_type,
        subject_number: subject.number,
        last_run_at: run_started_at,
        last_issue_comment_id: watermark(
            previous.and_then(|state| state.last_issue_comment_id),
            issue_comments.iter().map(|comment| comment.id),
        ),
        last_review_comment_id: watermark(
            previous.and_then(|state| state.last_review_comment_id),
            review_comments.iter().map(|comment| comment.id),
        ),
        last_head_sha: head_sha,
    };

    let summary = DeltaSummary {
        new_comments: delta.new_comments.as_ref().map_or(0, Vec::len),
        new_review_comments: delta.new_review_comments.as_ref().map_or(0, Vec::len),
        commits: delta
            .commit_changes
            .as_ref()
            .map_or(0, |changes| changes.commits.len()),
        files: delta
            .commit_changes
            .as_ref()
            .and_then(|changes| changes.files.as_ref())
            .map_or(0, Vec::len),
    };
    let mut delta_json =
        serde_json::to_string_pretty(&delta).context("failed to serialize delta")?;
    delta_json.push('\n');

    Ok(DeltaOutcome {
        delta_json,
        subject_url,
        next_state,
        summary,
    })
}

fn apply_event_excerpt(delta: &mut Delta, event_name: &str, payload: &Value) {
    let Some(kind) = EventKind::from_name(event_name) else {
        return;
    };
    match kind {
        EventKind::Issues => {
            delta.event_issue = payload.get("issue").map(EventIssue::from_payload);
        }
        EventKind::IssueComment => {
            delta.event_comment = payload
                .get("comment")
                .and_then(|comment| {
                    serde_json::from_value::<GithubIssueComment>(comment.clone()).ok()
                })
                .map(|comment| CommentEntry::from(&comment));
        }
        EventKind::PullRequest => {
            delta.event_pull_request = payload
                .get("pull_request")
                .map(EventPullRequest::from_payload);
        }
        EventKind::PullRequestReviewComment => {
            delta.event_review_comment = payload
                .get("comment")
                .and_then(|comment| {
                    serde_json::from_value::<GithubReviewComment>(comment.clone()).ok()
                })
                .map(|comment| ReviewCommentEntry::from(&comment));
        }
        EventKind::PullRequestReview => {
            delta.event_review = payload.get("review").map(EventReview::from_payload);
        }
    }
}

fn most_recent_issue_comments(comments: &[GithubIssueComment]) -> Vec<CommentEntry> {
    let mut ordered: Vec<&GithubIssueComment> = comments.iter().collect();
    ordered.sort_by(|left, right| {
        (left.created_at.as_deref(), left.id).cmp(&(right.created_at.as_deref(), right.id))
    });
    tail(&ordered, MAX_ITEMS)
        .iter()
        .map(|comment| CommentEntry::from(*comment))
        .collect()
}

fn most_recent_review_comments(comments: &[GithubReviewComment]) -> Vec<ReviewCommentEntry> {
    let mut ordered: Vec<&GithubReviewComment> = comments.iter().collect();
    ordered.sort_by(|left, right| {
        (left.created_at.as_deref(), left.id).cmp(&(right.created_at.as_deref(), right.id))
    });
    tail(&ordered, MAX_ITEMS)
        .iter()
        .map(|comment| ReviewCommentEntry::from(*comment))
        .collect()
}

async fn commit_changes(
    source: &dyn SubjectActivitySource,
    subject: Subject,
    previous_sha: Option<&str>,
    current_sha: &str,
) -> Result<Option<CommitChanges>> {
    match previous_sha {
        Some(previous_sha) if previous_sha == current_sha => Ok(None),
        Some(previous_sha) => {
            let compare = source
                .compare_commits(previous_sha, current_sha)
                .await
                .with_context(|| format!("failed to compare {previous_sha}...{current_sha}"))?;
            Ok(Some(CommitChanges {
                from: Some(previous_sha.to_string()),
                to: current_sha.to_string(),
                commits: tail(&compare.commits, MAX_ITEMS)
                    .iter()
                    .map(CommitEntry::from)
                    .collect(),
                files: Some(
                    compare
                        .files
                        .iter()
                        .take(MAX_ITEMS)
                        .map(FileEntry::from)
                        .collect(),
                ),
            }))
        }
        None => {
            let commits = source
                .list_pull_request_commits(subject.number)
                .await
                .with_context(|| format!("failed to list commits on {subject}"))?;
            Ok(Some(CommitChanges {
                from: None,
                to: current_sha.to_string(),
                commits: tail(&commits, BASELINE_COMMIT_COUNT)
                    .iter()
                    .map(CommitEntry::from)
                    .collect(),
                files: None,
            }))
        }
    }
}

fn tail<T>(items: &[T], limit: usize) -> &[T] {
    &items[items.len().saturating_sub(limit)..]
}

/// Highest of the previous watermark and every id observed this run.
fn watermark(previous: Option<u64>, observed: impl Iterator<Item = u64>) -> Option<u64> {
    observed.fold(previous, |max, id| Some(max.map_or(id, |max| max.max(id))))
}
