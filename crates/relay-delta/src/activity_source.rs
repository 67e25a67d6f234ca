use anyhow::Result;
use async_trait::async_trait;
use relay_github::models::{
    GithubCommit, GithubCompare, GithubIssue, GithubIssueComment, GithubPullRequest,
    GithubReviewComment,
};
use relay_github::GithubApiClient;

/// Read access to a subject's current state and recent activity.
#[async_trait]
pub trait SubjectActivitySource: Send + Sync {
    async fn fetch_issue(&self, number: u64) -> Result<GithubIssue>;

    async fn fetch_pull_request(&self, number: u64) -> Result<GithubPullRequest>;

    async fn list_issue_comments_since(
        &self,
        number: u64,
        since: &str,
    ) -> Result<Vec<GithubIssueComment>>;

    async fn list_review_comments_since(
        &self,
        number: u64,
        since: &str,
    ) -> Result<Vec<GithubReviewComment>>;

    async fn compare_commits(&self, base: &str, head: &str) -> Result<GithubCompare>;

    /// Every commit on the pull request, oldest first.
    async fn list_pull_request_commits(&self, number: u64) -> Result<Vec<GithubCommit>>;
}

#[async_trait]
impl SubjectActivitySource for GithubApiClient {
    async fn fetch_issue(&self, number: u64) -> Result<GithubIssue> {
        self.get_issue(number).await
    }

    async fn fetch_pull_request(&self, number: u64) -> Result<GithubPullRequest> {
        self.get_pull_request(number).await
    }

    async fn list_issue_comments_since(
        &self,
        number: u64,
        since: &str,
    ) -> Result<Vec<GithubIssueComment>> {
        GithubApiClient::list_issue_comments_since(self, number, since).await
    }

    async fn list_review_comments_since(
        &self,
        number: u64,
        since: &str,
    ) -> Result<Vec<GithubReviewComment>> {
        GithubApiClient::list_review_comments_since(self, number, since).await
    }

    async fn compare_commits(&self, base: &str, head: &str) -> Result<GithubCompare> {
        GithubApiClient::compare_commits(self, base, head).await
    }

    async fn list_pull_request_commits(&self, number: u64) -> Result<Vec<GithubCommit>> {
        GithubApiClient::list_pull_request_commits(self, number).await
    }
}
