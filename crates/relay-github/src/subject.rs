//! Maps an inbound GitHub event to the issue or pull request it concerns.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::github_api_client::ReactionTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Issue,
    Pr,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Pr => "pr",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "issue" => Some(Self::Issue),
            "pr" => Some(Self::Pr),
            _ => None,
        }
    }
}

/// The issue or pull request a run acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subject {
    pub subject_type: SubjectType,
    pub number: u64,
}

impl Subject {
    pub fn issue(number: u64) -> Self {
        Self {
            subject_type: SubjectType::Issue,
            number,
        }
    }

    pub fn pull_request(number: u64) -> Self {
        Self {
            subject_type: SubjectType::Pr,
            number,
        }
    }

    pub fn is_pull_request(&self) -> bool {
        self.subject_type == SubjectType::Pr
    }

    /// Artifact name scoped to this subject: `<prefix>-session-<type>-<number>`.
    pub fn artifact_name(&self, prefix: &str) -> String {
        format!(
            "{}-session-{}-{}",
            prefix.trim(),
            self.subject_type.as_str(),
            self.number
        )
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.subject_type.as_str(), self.number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Issues,
    IssueComment,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
}

impl EventKind {
    pub fn from_name(event_name: &str) -> Option<Self> {
        match event_name {
            "issues" => Some(Self::Issues),
            "issue_comment" => Some(Self::IssueComment),
            "pull_request" => Some(Self::PullRequest),
            "pull_request_review" => Some(Self::PullRequestReview),
            "pull_request_review_comment" => Some(Self::PullRequestReviewComment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issues => "issues",
            Self::IssueComment => "issue_comment",
            Self::PullRequest => "pull_request",
            Self::PullRequestReview => "pull_request_review",
            Self::PullRequestReviewComment => "pull_request_review_comment",
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Self::IssueComment | Self::PullRequestReviewComment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("unsupported event: {0}")]
    UnsupportedEvent(String),
    #[error("{field} number missing from {event} event payload")]
    MissingNumber { event: String, field: &'static str },
    #[error("comment author login missing from {event} event payload")]
    MissingCommentAuthor { event: String },
}

pub fn resolve_subject(event_name: &str, payload: &Value) -> Result<Subject, ResolutionError> {
    let kind = EventKind::from_name(event_name)
        .ok_or_else(|| ResolutionError::UnsupportedEvent(event_name.to_string()))?;
    let missing = |field: &'static str| ResolutionError::MissingNumber {
        event: event_name.to_string(),
        field,
    };
    match kind {
        EventKind::Issues => payload_number(payload, "issue")
            .map(Subject::issue)
            .ok_or_else(|| missing("issue")),
        EventKind::IssueComment => {
            let number = payload_number(payload, "issue").ok_or_else(|| missing("issue"))?;
            let is_pull_request = payload
                .get("issue")
                .and_then(|issue| issue.get("pull_request"))
                .is_some_and(|marker| !marker.is_null());
            Ok(if is_pull_request {
                Subject::pull_request(number)
            } else {
                Subject::issue(number)
            })
        }
        EventKind::PullRequest
        | EventKind::PullRequestReview
        | EventKind::PullRequestReviewComment => payload_number(payload, "pull_request")
            .map(Subject::pull_request)
            .ok_or_else(|| missing("pull_request")),
    }
}

fn payload_number(payload: &Value, object: &str) -> Option<u64> {
    payload
        .get(object)
        .and_then(|value| value.get("number"))
        .and_then(Value::as_u64)
        .filter(|number| *number > 0)
}

/// Login of the comment author. `Ok(None)` for non-comment events; a comment
/// event without a non-blank login is an error.
pub fn comment_author_login(
    kind: EventKind,
    payload: &Value,
) -> Result<Option<&str>, ResolutionError> {
    if !kind.is_comment() {
        return Ok(None);
    }
    payload
        .get("comment")
        .and_then(|comment| comment.get("user"))
        .and_then(|user| user.get("login"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|login| !login.is_empty())
        .map(Some)
        .ok_or_else(|| ResolutionError::MissingCommentAuthor {
            event: kind.as_str().to_string(),
        })
}

/// Where the acknowledgement reaction for this event belongs.
pub fn reaction_target(kind: EventKind, payload: &Value, subject: &Subject) -> ReactionTarget {
    let comment_id = payload
        .get("comment")
        .and_then(|comment| comment.get("id"))
        .and_then(Value::as_u64);
    match (kind, comment_id) {
        (EventKind::IssueComment, Some(id)) => ReactionTarget::IssueComment(id),
        (EventKind::PullRequestReviewComment, Some(id)) => ReactionTarget::ReviewComment(id),
        _ => ReactionTarget::Issue(subject.number),
    }
}
