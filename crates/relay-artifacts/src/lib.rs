//! Artifact store gateway for session bundles.
//!
//! Session directories are persisted between ephemeral runs as named
//! artifact bundles. [`ArtifactStore`] is the seam the runtime depends on;
//! [`GithubArtifactStore`] talks to the GitHub Actions artifact APIs and
//! [`DirectoryArtifactStore`] keeps bundles on a local filesystem.

mod bundle;
mod directory_store;
mod github_store;
mod results_client;
mod selection;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

pub use bundle::{bundle_directory, extract_bundle, BundleSummary};
pub use directory_store::DirectoryArtifactStore;
pub use github_store::{GithubArtifactStore, ARTIFACT_PAGE_SIZE};
pub use relay_github::models::GithubArtifact as ArtifactRecord;
pub use results_client::{ActionsResultsClient, RuntimeTokenScope};
pub use selection::select_latest;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("artifact lookup for '{name}' failed on page {page}: {reason}")]
pub struct ArtifactLookupError {
    pub name: String,
    pub page: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactDownloadError {
    #[error("session artifact {artifact_id} is missing its workflow run; cannot resume without it")]
    MissingWorkflowRun { artifact_id: u64 },
    #[error("failed to download session artifact {artifact_id}: {reason}")]
    Transfer { artifact_id: u64, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub artifact_id: Option<u64>,
    pub files: usize,
    pub bytes: u64,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Newest non-expired artifact named `name`, or `None` when a fresh start is needed.
    async fn find_latest(&self, name: &str) -> Result<Option<ArtifactRecord>, ArtifactLookupError>;

    /// Materializes `artifact`'s files under `target_dir`.
    async fn download(
        &self,
        artifact: &ArtifactRecord,
        target_dir: &Path,
    ) -> Result<(), ArtifactDownloadError>;

    /// Bundles every file under `source_dir` into one artifact named `name`.
    async fn upload(&self, name: &str, source_dir: &Path) -> Result<UploadReceipt>;
}
