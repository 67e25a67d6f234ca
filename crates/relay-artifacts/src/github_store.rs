use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use relay_github::models::GithubArtifact;
use relay_github::GithubApiClient;

use crate::bundle::{bundle_directory, extract_bundle};
use crate::results_client::ActionsResultsClient;
use crate::selection::select_latest;
use crate::{ArtifactDownloadError, ArtifactLookupError, ArtifactStore, UploadReceipt};

pub const ARTIFACT_PAGE_SIZE: usize = 100;

/// Artifact store backed by the repository's GitHub Actions artifacts.
///
/// Listing and download go through the REST API; upload needs the runner's
/// results service and is unavailable when no [`ActionsResultsClient`] is set.
pub struct GithubArtifactStore {
    client: GithubApiClient,
    results: Option<ActionsResultsClient>,
    retention_days: u32,
    work_dir: PathBuf,
}

impl GithubArtifactStore {
    pub fn new(
        client: GithubApiClient,
        results: Option<ActionsResultsClient>,
        retention_days: u32,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            results,
            retention_days,
            work_dir: work_dir.into(),
        }
    }

    async fn list_named(&self, name: &str) -> Result<Vec<GithubArtifact>, ArtifactLookupError> {
        let mut page = 1_u32;
        let mut artifacts = Vec::new();
        loop {
            let chunk = self
                .client
                .list_artifacts_page(name, page, ARTIFACT_PAGE_SIZE)
                .await
                .map_err(|error| ArtifactLookupError {
                    name: name.to_string(),
                    page,
                    reason: format!("{error:#}"),
                })?;
            let chunk_len = chunk.artifacts.len();
            // the name filter is server-side but exact matching is cheap to enforce
            artifacts.extend(
                chunk
                    .artifacts
                    .into_iter()
                    .filter(|artifact| artifact.name == name),
            );
            if chunk_len < ARTIFACT_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(artifacts)
    }

    async fn download_and_extract(&self, artifact_id: u64, target_dir: &Path) -> Result<usize> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("failed to create {}", self.work_dir.display()))?;
        let zip_path = self.work_dir.join(format!("artifact-{artifact_id}.zip"));
        let bytes = self
            .client
            .download_artifact_zip(artifact_id, &zip_path)
            .await?;
        tracing::debug!(artifact_id, bytes, "downloaded session artifact archive");

        let archive = zip_path.clone();
        let target = target_dir.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_bundle(&archive, &target))
            .await
            .map_err(|error| anyhow!("artifact extraction task failed: {error}"))?;
        let _ = tokio::fs::remove_file(&zip_path).await;
        extracted
    }
}

#[async_trait]
impl ArtifactStore for GithubArtifactStore {
    async fn find_latest(&self, name: &str) -> Result<Option<GithubArtifact>, ArtifactLookupError> {
        let artifacts = self.list_named(name).await?;
        let latest = select_latest(&artifacts).cloned();
        tracing::debug!(
            name,
            candidates = artifacts.len(),
            selected = latest.as_ref().map(|artifact| artifact.id),
            "resolved latest session artifact"
        );
        Ok(latest)
    }

    async fn download(
        &self,
        artifact: &GithubArtifact,
        target_dir: &Path,
    ) -> Result<(), ArtifactDownloadError> {
        if artifact.workflow_run_id().is_none() {
            return Err(ArtifactDownloadError::MissingWorkflowRun {
                artifact_id: artifact.id,
            });
        }
        let files = self
            .download_and_extract(artifact.id, target_dir)
            .await
            .map_err(|error| ArtifactDownloadError::Transfer {
                artifact_id: artifact.id,
                reason: format!("{error:#}"),
            })?;
        tracing::info!(
            artifact_id = artifact.id,
            files,
            target = %target_dir.display(),
            "restored session artifact"
        );
        Ok(())
    }

    async fn upload(&self, name: &str, source_dir: &Path) -> Result<UploadReceipt> {
        let Some(results) = self.results.as_ref() else {
            bail!("artifact upload requires ACTIONS_RUNTIME_TOKEN and ACTIONS_RESULTS_URL");
        };
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("failed to create {}", self.work_dir.display()))?;
        let zip_path = self.work_dir.join(format!("{name}.zip"));

        let source = source_dir.to_path_buf();
        let archive = zip_path.clone();
        let summary = tokio::task::spawn_blocking(move || bundle_directory(&source, &archive))
            .await
            .map_err(|error| anyhow!("artifact bundling task failed: {error}"))??;

        let upload_url = results.create_artifact(name, self.retention_days).await?;
        results.upload_blob(&upload_url, &zip_path).await?;
        let artifact_id = results
            .finalize_artifact(name, summary.bytes, &summary.sha256)
            .await?;
        let _ = tokio::fs::remove_file(&zip_path).await;

        tracing::info!(
            name,
            artifact_id,
            files = summary.files,
            bytes = summary.bytes,
            "uploaded session artifact"
        );
        Ok(UploadReceipt {
            artifact_id,
            files: summary.files,
            bytes: summary.bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use relay_github::models::{GithubArtifact, GithubWorkflowRunRef};
    use relay_github::{GithubApiClient, GithubClientConfig, RepoRef};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use super::{GithubArtifactStore, ARTIFACT_PAGE_SIZE};
    use crate::bundle::bundle_directory;
    use crate::results_client::tests::runtime_token_with_scope;
    use crate::results_client::ActionsResultsClient;
    use crate::{ArtifactDownloadError, ArtifactStore};

    const NAME: &str = "action-agent-session-issue-7";

    fn github_client(base_url: &str) -> GithubApiClient {
        GithubApiClient::new(GithubClientConfig {
            api_base: base_url.to_string(),
            token: "test-token".to_string(),
            repo: RepoRef::parse("owner/repo").expect("repo"),
            request_timeout_ms: 3_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        })
        .expect("client")
    }

    fn artifact_json(id: u64, created_at: &str, expired: bool) -> Value {
        json!({
            "id": id,
            "name": NAME,
            "expired": expired,
            "created_at": created_at,
            "workflow_run": {"id": 500 + id}
        })
    }

    fn artifact(id: u64, run_id: Option<u64>) -> GithubArtifact {
        GithubArtifact {
            id,
            name: NAME.to_string(),
            expired: false,
            created_at: Some("2026-10-01T00:00:00Z".to_string()),
            workflow_run: run_id.map(|id| GithubWorkflowRunRef { id: Some(id) }),
        }
    }

    #[tokio::test]
    async fn functional_find_latest_pages_until_short_page_and_skips_expired() {
        let server = MockServer::start();
        let full_page: Vec<Value> = (1..=ARTIFACT_PAGE_SIZE as u64)
            .map(|id| artifact_json(id, "2026-01-01T00:00:00Z", false))
            .collect();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/owner/repo/actions/artifacts")
                .query_param("name", NAME)
                .query_param("page", "1")
                .query_param("per_page", "100");
            then.status(200)
                .json_body(json!({"total_count": 102, "artifacts": full_page}));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/owner/repo/actions/artifacts")
                .query_param("page", "2");
            then.status(200).json_body(json!({
                "total_count": 102,
                "artifacts": [
                    artifact_json(900, "2026-06-01T00:00:00Z", true),
                    artifact_json(901, "2026-05-01T00:00:00Z", false)
                ]
            }));
        });

        let temp = tempdir().expect("tempdir");
        let store = GithubArtifactStore::new(github_client(&server.base_url()), None, 7, temp.path());
        let latest = store.find_latest(NAME).await.expect("lookup");

        assert_eq!(latest.map(|artifact| artifact.id), Some(901));
        first.assert();
        second.assert();
    }

    #[tokio::test]
    async fn regression_find_latest_reports_lookup_failure_without_retry() {
        let server = MockServer::start();
        let listing = server.mock(|when, then| {
            when.method(GET).path("/repos/owner/repo/actions/artifacts");
            then.status(502).body("bad gateway");
        });
        let temp = tempdir().expect("tempdir");
        let store = GithubArtifactStore::new(github_client(&server.base_url()), None, 7, temp.path());

        let error = store.find_latest(NAME).await.expect_err("lookup failure");
        assert_eq!(error.name, NAME);
        assert_eq!(error.page, 1);
        assert!(error.reason.contains("502"));
        listing.assert_calls(1);
    }

    #[tokio::test]
    async fn regression_download_requires_workflow_run_before_any_request() {
        let server = MockServer::start();
        let download = server.mock(|when, then| {
            when.method(GET).path("/repos/owner/repo/actions/artifacts/3/zip");
            then.status(200).body("unused");
        });
        let temp = tempdir().expect("tempdir");
        let store = GithubArtifactStore::new(github_client(&server.base_url()), None, 7, temp.path());

        let error = store
            .download(&artifact(3, None), &temp.path().join("out"))
            .await
            .expect_err("missing run");
        assert_eq!(error, ArtifactDownloadError::MissingWorkflowRun { artifact_id: 3 });
        download.assert_calls(0);
    }

    #[tokio::test]
    async fn integration_download_extracts_archive_into_target() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("source");
        std::fs::create_dir_all(source.join("sessions")).expect("mkdir");
        std::fs::write(source.join("sessions/rollout.jsonl"), "{\"turn\":1}\n").expect("write");
        let zip_path = temp.path().join("fixture.zip");
        bundle_directory(&source, &zip_path).expect("bundle");
        let zip_bytes = std::fs::read(&zip_path).expect("read zip");

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/owner/repo/actions/artifacts/4/zip");
            then.status(200).body(zip_bytes.clone());
        });
        let store = GithubArtifactStore::new(
            github_client(&server.base_url()),
            None,
            7,
            temp.path().join("work"),
        );
        let target = temp.path().join("restored");
        store
            .download(&artifact(4, Some(88)), &target)
            .await
            .expect("download");

        assert_eq!(
            std::fs::read_to_string(target.join("sessions/rollout.jsonl")).expect("read"),
            "{\"turn\":1}\n"
        );
        assert!(!temp.path().join("work/artifact-4.zip").exists());
    }

    #[tokio::test]
    async fn regression_download_wraps_transfer_failures() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/owner/repo/actions/artifacts/5/zip");
            then.status(410).body("gone");
        });
        let temp = tempdir().expect("tempdir");
        let store = GithubArtifactStore::new(github_client(&server.base_url()), None, 7, temp.path());
        let error = store
            .download(&artifact(5, Some(1)), &temp.path().join("out"))
            .await
            .expect_err("transfer failure");
        assert!(matches!(
            error,
            ArtifactDownloadError::Transfer { artifact_id: 5, ref reason } if reason.contains("410")
        ));
    }

    #[tokio::test]
    async fn integration_upload_bundles_directory_through_results_service() {
        let server = MockServer::start();
        let token = runtime_token_with_scope("Actions.Results:run-1:job-2");
        let blob_url = server.url("/blob");
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/twirp/github.actions.results.api.v1.ArtifactService/CreateArtifact")
                .body_includes(format!("\"name\":\"{NAME}\""));
            then.status(200)
                .json_body(json!({"ok": true, "signedUploadUrl": blob_url}));
        });
        let blob = server.mock(|when, then| {
            when.method(PUT).path("/blob");
            then.status(201);
        });
        let finalize = server.mock(|when, then| {
            when.method(POST)
                .path("/twirp/github.actions.results.api.v1.ArtifactService/FinalizeArtifact")
                .body_includes("\"hash\":\"sha256:");
            then.status(200).json_body(json!({"ok": true, "artifactId": "42"}));
        });

        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("session");
        std::fs::create_dir_all(source.join("sessions")).expect("mkdir");
        std::fs::write(source.join("state.json"), "{}\n").expect("write");
        std::fs::write(source.join("sessions/a.jsonl"), "{}\n").expect("write");

        let results =
            ActionsResultsClient::new(&server.base_url(), &token, 3_000).expect("results client");
        let store = GithubArtifactStore::new(
            github_client(&server.base_url()),
            Some(results),
            7,
            temp.path().join("work"),
        );
        let receipt = store.upload(NAME, &source).await.expect("upload");

        assert_eq!(receipt.artifact_id, Some(42));
        assert_eq!(receipt.files, 2);
        assert!(receipt.bytes > 0);
        create.assert();
        blob.assert();
        finalize.assert();
    }

    #[tokio::test]
    async fn regression_upload_without_results_service_fails_fast() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join("state.json"), "{}\n").expect("write");
        let store = GithubArtifactStore::new(github_client("http://127.0.0.1:9"), None, 7, temp.path());
        let error = store.upload(NAME, temp.path()).await.expect_err("no results");
        assert!(error.to_string().contains("ACTIONS_RUNTIME_TOKEN"));
    }
}
