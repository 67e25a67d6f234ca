//! Zip bundling for session directories.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use relay_core::list_files_recursive;
use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub files: usize,
    pub bytes: u64,
    pub sha256: String,
}

/// Writes every regular file under `source_dir` into a deflated zip at `zip_path`.
///
/// Entry names are relative to `source_dir` and always use `/` separators.
pub fn bundle_directory(source_dir: &Path, zip_path: &Path) -> Result<BundleSummary> {
    let files = list_files_recursive(source_dir)?;
    if files.is_empty() {
        bail!(
            "no session files found for upload under {}",
            source_dir.display()
        );
    }

    let output = File::create(zip_path)
        .with_context(|| format!("failed to create {}", zip_path.display()))?;
    let mut writer = ZipWriter::new(output);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for path in &files {
        let relative = path
            .strip_prefix(source_dir)
            .with_context(|| format!("{} escapes {}", path.display(), source_dir.display()))?;
        let entry_name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        writer
            .start_file(entry_name.as_str(), options)
            .with_context(|| format!("failed to start zip entry {entry_name}"))?;
        let mut source =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        std::io::copy(&mut source, &mut writer)
            .with_context(|| format!("failed to compress {}", path.display()))?;
    }
    let mut output = writer
        .finish()
        .with_context(|| format!("failed to finish {}", zip_path.display()))?;
    output
        .flush()
        .with_context(|| format!("failed to flush {}", zip_path.display()))?;

    let (bytes, sha256) = sha256_file(zip_path)?;
    Ok(BundleSummary {
        files: files.len(),
        bytes,
        sha256,
    })
}

/// Unpacks a zip archive into `target_dir`, returning the entry count.
pub fn extract_bundle(zip_path: &Path, target_dir: &Path) -> Result<usize> {
    let file =
        File::open(zip_path).with_context(|| format!("failed to open {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("{} is not a valid zip archive", zip_path.display()))?;
    std::fs::create_dir_all(target_dir)
        .with_context(|| format!("failed to create {}", target_dir.display()))?;
    archive
        .extract(target_dir)
        .with_context(|| format!("failed to extract into {}", target_dir.display()))?;
    Ok(archive.len())
}

fn sha256_file(path: &Path) -> Result<(u64, String)> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    let mut total = 0_u64;
    loop {
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total = total.saturating_add(read as u64);
    }
    Ok((total, format!("{:x}", hasher.finalize())))
}
