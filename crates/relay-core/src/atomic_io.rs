use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp_ms;

static TEMP_FILE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Replaces `path` with `content` through a synced sibling temp file, so a
/// reader sees either the old file or the complete new one.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let temp_path = sibling_temp_path(parent_dir, path);
    let written = std::fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(content.as_bytes())?;
        file.sync_all()
    });
    if let Err(error) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error)
            .with_context(|| format!("failed to write temporary file {}", temp_path.display()));
    }
    if let Err(error) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

fn sibling_temp_path(parent_dir: &Path, path: &Path) -> PathBuf {
    let stem = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "relay-state".to_string());
    parent_dir.join(format!(
        ".{stem}.tmp-{}-{}-{}",
        std::process::id(),
        current_unix_timestamp_ms(),
        TEMP_FILE_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    ))
}

#[cfg(test)]
mod tests {
    use super::write_text_atomic;

    #[test]
    fn unit_write_text_atomic_rejects_empty_and_directory_targets() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let empty = write_text_atomic(std::path::Path::new(""), "x").expect_err("empty path");
        assert!(empty.to_string().contains("cannot be empty"));

        let dir_error = write_text_atomic(tempdir.path(), "x").expect_err("directory target");
        assert!(dir_error.to_string().contains("is a directory"));
    }

    #[test]
    fn functional_write_text_atomic_creates_parents_and_overwrites() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested").join("state.json");
        write_text_atomic(&path, "first").expect("first write");
        write_text_atomic(&path, "second").expect("second write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "second");

        let leftovers = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
