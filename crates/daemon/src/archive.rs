// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gzip tar packaging for artifacts and cache archives.
//!
//! Compression runs on the blocking pool.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("nothing to archive")]
    Empty,

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ArchiveError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| ArchiveError::Io { path: path.to_path_buf(), source }
    }
}

/// A file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packaged {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// Created by packaging and removed after upload
    pub temporary: bool,
}

impl Packaged {
    pub async fn cleanup(&self) {
        if !self.temporary {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::debug!(path = %self.path.display(), error = %e, "failed to remove staged archive");
        }
    }
}

/// Prepare `paths` for upload.
///
/// A single regular file is used as-is. Several files, or any directory,
/// are packed into `<staging>/<stem>.tar.gz` rooted at their common parent
/// directory.
pub async fn package(paths: &[PathBuf], staging: &Path, stem: &str) -> Result<Packaged, ArchiveError> {
    if let [single] = paths {
        let meta = tokio::fs::metadata(single).await.map_err(ArchiveError::io(single))?;
        if meta.is_file() {
            let file_name = single
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| stem.to_string());
            return Ok(Packaged { path: single.clone(), file_name, size: meta.len(), temporary: false });
        }
    }

    let root = common_parent(paths).ok_or(ArchiveError::Empty)?;
    let entries: Vec<(PathBuf, PathBuf)> = paths
        .iter()
        .map(|p| (p.clone(), p.strip_prefix(&root).map(Path::to_path_buf).unwrap_or_else(|_| p.clone())))
        .collect();

    let file_name = format!("{stem}.tar.gz");
    let dest = staging.join(&file_name);
    tokio::fs::create_dir_all(staging).await.map_err(ArchiveError::io(staging))?;

    let size = {
        let dest = dest.clone();
        tokio::task::spawn_blocking(move || create_tar_gz(&dest, &entries)).await??
    };

    Ok(Packaged { path: dest, file_name, size, temporary: true })
}

/// Deepest directory containing the parent of every path.
fn common_parent(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut parents = paths.iter().map(|p| p.parent().unwrap_or(Path::new("")).to_path_buf());
    let mut common = parents.next()?;
    for parent in parents {
        while !parent.starts_with(&common) {
            if !common.pop() {
                return Some(PathBuf::new());
            }
        }
    }
    Some(common)
}

/// Write `entries` (source path, name inside the archive) to a gzip tar at
/// `dest`, recursing into directories. Returns the archive size.
pub fn create_tar_gz(dest: &Path, entries: &[(PathBuf, PathBuf)]) -> Result<u64, ArchiveError> {
    if entries.is_empty() {
        return Err(ArchiveError::Empty);
    }
    let file = File::create(dest).map_err(ArchiveError::io(dest))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    for (src, name) in entries {
        let meta = std::fs::symlink_metadata(src).map_err(ArchiveError::io(src))?;
        if meta.is_dir() {
            builder.append_dir_all(name, src).map_err(ArchiveError::io(src))?;
        } else {
            builder.append_path_with_name(src, name).map_err(ArchiveError::io(src))?;
        }
    }

    let encoder = builder.into_inner().map_err(ArchiveError::io(dest))?;
    encoder.finish().map_err(ArchiveError::io(dest))?;
    Ok(std::fs::metadata(dest).map_err(ArchiveError::io(dest))?.len())
}

/// Counts from an extraction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Extracted {
    pub written: usize,
    pub skipped: usize,
}

/// Extract a gzip tar under `root` without overwriting anything already on
/// disk. Entries that would land outside `root`, directly or through a
/// symlink unpacked earlier, are never written.
pub fn extract_no_overwrite(archive: impl Read, root: &Path) -> Result<Extracted, ArchiveError> {
    let mut archive = tar::Archive::new(GzDecoder::new(archive));
    archive.set_overwrite(false);
    let mut stats = Extracted::default();

    for entry in archive.entries().map_err(ArchiveError::io(root))? {
        let mut entry = entry.map_err(ArchiveError::io(root))?;
        let relative = entry.path().map_err(ArchiveError::io(root))?.into_owned();

        if !relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
            tracing::warn!(path = %relative.display(), "skipping cache entry outside extraction root");
            stats.skipped += 1;
            continue;
        }

        let is_dir = entry.header().entry_type().is_dir();
        let target = root.join(&relative);
        if std::fs::symlink_metadata(&target).is_ok() {
            if !is_dir {
                stats.skipped += 1;
            }
            continue;
        }

        // unpack_in refuses targets whose parent resolves outside root
        match entry.unpack_in(root).map_err(ArchiveError::io(&target))? {
            true if !is_dir => stats.written += 1,
            true => {}
            false => {
                tracing::warn!(path = %relative.display(), "skipping cache entry outside extraction root");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}

/// [`extract_no_overwrite`] reading the archive from a file on disk.
pub fn extract_file_no_overwrite(archive: &Path, root: &Path) -> Result<Extracted, ArchiveError> {
    let file = File::open(archive).map_err(ArchiveError::io(archive))?;
    extract_no_overwrite(std::io::BufReader::new(file), root)
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
