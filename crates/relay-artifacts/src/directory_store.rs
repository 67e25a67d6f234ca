//! Filesystem-backed artifact store for runs outside GitHub Actions.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<name>/index.jsonl      one record per upload
//! <root>/<name>/<id>.zip         bundled session tree
//! ```

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use relay_core::current_unix_timestamp_ms;
use relay_github::models::{GithubArtifact, GithubWorkflowRunRef};
use serde::{Deserialize, Serialize};

use crate::bundle::{bundle_directory, extract_bundle};
use crate::selection::select_latest;
use crate::{ArtifactDownloadError, ArtifactLookupError, ArtifactStore, UploadReceipt};

const INDEX_FILE: &str = "index.jsonl";
const DAY_MS: u64 = 86_400_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct StoredArtifactRecord {
    id: u64,
    name: String,
    created_unix_ms: u64,
    expires_unix_ms: Option<u64>,
    workflow_run_id: Option<u64>,
    files: usize,
    bytes: u64,
    checksum_sha256: String,
}

impl StoredArtifactRecord {
    fn to_artifact(&self, now_unix_ms: u64) -> GithubArtifact {
        let created_at = i64::try_from(self.created_unix_ms)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true));
        GithubArtifact {
            id: self.id,
            name: self.name.clone(),
            expired: self
                .expires_unix_ms
                .is_some_and(|expiry| expiry <= now_unix_ms),
            created_at,
            workflow_run: self
                .workflow_run_id
                .map(|id| GithubWorkflowRunRef { id: Some(id) }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryArtifactStore {
    root: PathBuf,
    workflow_run_id: Option<u64>,
    retention_days: u32,
}

impl DirectoryArtifactStore {
    /// Uploads are stamped with `workflow_run_id`; without one they cannot be resumed.
    pub fn new(root: impl Into<PathBuf>, workflow_run_id: Option<u64>, retention_days: u32) -> Self {
        Self {
            root: root.into(),
            workflow_run_id,
            retention_days,
        }
    }

    fn artifact_dir(&self, name: &str) -> PathBuf {
        self.root.join(sanitize_for_path(name))
    }

    fn load_records(&self, name: &str) -> Result<Vec<StoredArtifactRecord>> {
        let path = self.artifact_dir(name).join(INDEX_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut records = Vec::new();
        for (index, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("failed reading {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredArtifactRecord>(&line) {
                Ok(record) => records.push(record),
                Err(error) => tracing::warn!(
                    path = %path.display(),
                    line = index + 1,
                    %error,
                    "skipping malformed artifact index line"
                ),
            }
        }
        Ok(records)
    }

    fn append_record(&self, record: &StoredArtifactRecord) -> Result<()> {
        let path = self.artifact_dir(&record.name).join(INDEX_FILE);
        let mut line = serde_json::to_string(record).context("failed to encode artifact record")?;
        line.push('\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append {}", path.display()))?;
        Ok(())
    }

    fn find_record(&self, name: &str, artifact_id: u64) -> Result<StoredArtifactRecord> {
        self.load_records(name)?
            .into_iter()
            .find(|record| record.id == artifact_id)
            .ok_or_else(|| anyhow!("artifact {artifact_id} not found in store"))
    }

    fn upload_blocking(&self, name: &str, source_dir: &Path) -> Result<UploadReceipt> {
        let dir = self.artifact_dir(name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let id = self
            .load_records(name)?
            .iter()
            .map(|record| record.id)
            .max()
            .unwrap_or(0)
            .saturating_add(1);
        let summary = bundle_directory(source_dir, &dir.join(format!("{id}.zip")))?;
        let created_unix_ms = current_unix_timestamp_ms();
        let expires_unix_ms = (self.retention_days > 0).then(|| {
            created_unix_ms.saturating_add(u64::from(self.retention_days).saturating_mul(DAY_MS))
        });
        self.append_record(&StoredArtifactRecord {
            id,
            name: name.to_string(),
            created_unix_ms,
            expires_unix_ms,
            workflow_run_id: self.workflow_run_id,
            files: summary.files,
            bytes: summary.bytes,
            checksum_sha256: summary.sha256,
        })?;
        Ok(UploadReceipt {
            artifact_id: Some(id),
            files: summary.files,
            bytes: summary.bytes,
        })
    }
}

#[async_trait]
impl ArtifactStore for DirectoryArtifactStore {
    async fn find_latest(&self, name: &str) -> Result<Option<GithubArtifact>, ArtifactLookupError> {
        let lookup_error = |reason: String| ArtifactLookupError {
            name: name.to_string(),
            page: 1,
            reason,
        };
        let store = self.clone();
        let owned_name = name.to_string();
        let records = tokio::task::spawn_blocking(move || store.load_records(&owned_name))
            .await
            .map_err(|error| lookup_error(format!("artifact index task failed: {error}")))?
            .map_err(|error| lookup_error(format!("{error:#}")))?;
        let now = current_unix_timestamp_ms();
        let artifacts: Vec<GithubArtifact> = records
            .iter()
            .map(|record| record.to_artifact(now))
            .collect();
        Ok(select_latest(&artifacts).cloned())
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
        let transfer = |error: anyhow::Error| ArtifactDownloadError::Transfer {
            artifact_id: artifact.id,
            reason: format!("{error:#}"),
        };
        let store = self.clone();
        let name = artifact.name.clone();
        let artifact_id = artifact.id;
        let target = target_dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let record = store.find_record(&name, artifact_id)?;
            let zip_path = store
                .artifact_dir(&record.name)
                .join(format!("{}.zip", record.id));
            extract_bundle(&zip_path, &target)
        })
        .await
        .map_err(|error| anyhow!("artifact extraction task failed: {error}"))
        .and_then(|extracted| extracted)
        .map_err(transfer)?;
        Ok(())
    }

    async fn upload(&self, name: &str, source_dir: &Path) -> Result<UploadReceipt> {
        let store = self.clone();
        let owned_name = name.to_string();
        let source = source_dir.to_path_buf();
        let receipt =
            tokio::task::spawn_blocking(move || store.upload_blocking(&owned_name, &source))
                .await
                .map_err(|error| anyhow!("artifact bundling task failed: {error}"))??;
        tracing::info!(
            name,
            artifact_id = receipt.artifact_id,
            files = receipt.files,
            root = %self.root.display(),
            "stored session artifact"
        );
        Ok(receipt)
    }
}

fn sanitize_for_path(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
