//! Restore, normalization and scrubbing of the live agent session directory.

use std::path::{Path, PathBuf};

use relay_artifacts::{ArtifactDownloadError, ArtifactRecord, ArtifactStore};
use relay_core::{copy_dir_recursive, dir_is_empty};

pub const SESSIONS_DIR: &str = "sessions";
pub const CREDENTIALS_FILE: &str = "auth.json";
pub const TMP_DIR: &str = "tmp";
pub const SKILLS_DIR: &str = "skills";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionRestoreError {
    #[error("session artifact {artifact_id} is missing its workflow run; cannot resume without it")]
    MissingWorkflowRun { artifact_id: u64 },
    #[error("failed to download session artifact {artifact_id}: {reason}")]
    DownloadFailed { artifact_id: u64, reason: String },
    #[error("session artifact contents missing after download into {}", .path.display())]
    SessionArtifactMissingContents { path: PathBuf },
    #[error("session directory operation failed at {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },
}

impl From<ArtifactDownloadError> for SessionRestoreError {
    fn from(error: ArtifactDownloadError) -> Self {
        match error {
            ArtifactDownloadError::MissingWorkflowRun { artifact_id } => {
                Self::MissingWorkflowRun { artifact_id }
            }
            ArtifactDownloadError::Transfer {
                artifact_id,
                reason,
            } => Self::DownloadFailed {
                artifact_id,
                reason,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    /// Live directory the agent reads and writes (`CODEX_HOME`).
    pub session_dir: PathBuf,
    /// Download target used only during restore.
    pub scratch_dir: PathBuf,
}

impl SessionPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            session_dir: root.join("agent-session"),
            scratch_dir: root.join("agent-session-download"),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.session_dir.join(crate::STATE_FILE_NAME)
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.session_dir.join(SESSIONS_DIR)
    }
}

/// How the downloaded bundle was laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLayout {
    /// Bundle root already holds a `sessions/` folder; copied as-is.
    Rooted,
    /// Bundle root is the sessions folder itself; nested under `sessions/`.
    Nested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub layout: SessionLayout,
    pub files: usize,
}

/// Downloads `artifact` and replaces the live session directory with its contents.
pub async fn restore_session(
    store: &dyn ArtifactStore,
    artifact: &ArtifactRecord,
    paths: &SessionPaths,
) -> Result<RestoreReport, SessionRestoreError> {
    reset_dir(&paths.scratch_dir)?;
    store.download(artifact, &paths.scratch_dir).await?;
    if dir_is_empty(&paths.scratch_dir) {
        return Err(SessionRestoreError::SessionArtifactMissingContents {
            path: paths.scratch_dir.clone(),
        });
    }

    remove_path(&paths.session_dir)?;
    let (layout, destination) = if paths.scratch_dir.join(SESSIONS_DIR).is_dir() {
        (SessionLayout::Rooted, paths.session_dir.clone())
    } else {
        (SessionLayout::Nested, paths.sessions_path())
    };
    let files = copy_dir_recursive(&paths.scratch_dir, &destination).map_err(|error| {
        SessionRestoreError::Io {
            path: destination.clone(),
            reason: format!("{error:#}"),
        }
    })?;
    tracing::info!(
        artifact_id = artifact.id,
        ?layout,
        files,
        session_dir = %paths.session_dir.display(),
        "restored session directory"
    );
    Ok(RestoreReport { layout, files })
}

/// Starts from an empty live session directory when there is nothing to resume.
pub fn prepare_fresh_session(paths: &SessionPaths) -> Result<(), SessionRestoreError> {
    reset_dir(&paths.session_dir)?;
    remove_path(&paths.scratch_dir)
}

/// Removes credentials and transient folders so they never reach the artifact store.
pub fn strip_credentials(session_dir: &Path) -> Result<Vec<PathBuf>, SessionRestoreError> {
    let mut removed = Vec::new();
    for name in [CREDENTIALS_FILE, TMP_DIR, SKILLS_DIR] {
        let path = session_dir.join(name);
        if path.symlink_metadata().is_ok() {
            remove_path(&path)?;
            removed.push(path);
        }
    }
    Ok(removed)
}

/// Copies repository-provided skills from `<workspace>/skills` into the session.
pub fn install_skills(workspace: &Path, session_dir: &Path) -> Result<usize, SessionRestoreError> {
    let source = workspace.join(SKILLS_DIR);
    if !source.is_dir() {
        return Ok(0);
    }
    let destination = session_dir.join(SKILLS_DIR);
    copy_dir_recursive(&source, &destination).map_err(|error| SessionRestoreError::Io {
        path: destination,
        reason: format!("{error:#}"),
    })
}

fn reset_dir(path: &Path) -> Result<(), SessionRestoreError> {
    remove_path(path)?;
    std::fs::create_dir_all(path).map_err(|error| io_error(path, error))
}

fn remove_path(path: &Path) -> Result<(), SessionRestoreError> {
    let metadata = match path.symlink_metadata() {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(io_error(path, error)),
    };
    let result = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|error| io_error(path, error))
}

fn io_error(path: &Path, error: std::io::Error) -> SessionRestoreError {
    SessionRestoreError::Io {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}
