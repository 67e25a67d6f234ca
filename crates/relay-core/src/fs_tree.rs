//! Iterative directory traversal helpers.
//!
//! Only regular files and directories are visited; symlinks and other entry
//! kinds are ignored so a restored session can never point outside its root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Lists every regular file under `root`, depth-first, using an explicit work-stack.
pub fn list_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("failed to read directory {}", current.display()))?;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to read entry in {}", current.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to stat {}", entry.path().display()))?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Copies the contents of `source` into `destination`, creating directories as needed.
///
/// Returns the number of files copied. Existing files at the destination are overwritten.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> Result<usize> {
    std::fs::create_dir_all(destination)
        .with_context(|| format!("failed to create {}", destination.display()))?;
    let mut copied = 0_usize;
    let mut stack = vec![(source.to_path_buf(), destination.to_path_buf())];
    while let Some((from_dir, to_dir)) = stack.pop() {
        let entries = std::fs::read_dir(&from_dir)
            .with_context(|| format!("failed to read directory {}", from_dir.display()))?;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to read entry in {}", from_dir.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to stat {}", entry.path().display()))?;
            let target = to_dir.join(entry.file_name());
            if file_type.is_dir() {
                std::fs::create_dir_all(&target)
                    .with_context(|| format!("failed to create {}", target.display()))?;
                stack.push((entry.path(), target));
            } else if file_type.is_file() {
                std::fs::copy(entry.path(), &target).with_context(|| {
                    format!(
                        "failed to copy {} to {}",
                        entry.path().display(),
                        target.display()
                    )
                })?;
                copied = copied.saturating_add(1);
            }
        }
    }
    Ok(copied)
}

/// Returns true when `path` is missing, not a directory, or has no entries.
pub fn dir_is_empty(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
