// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort build cache transfer.
//!
//! Nothing here fails a build. A failed restore also disables the save for
//! the same run, so a tree that was never reconciled with the cached
//! baseline does not become the next baseline.

use crate::archive::{self, ArchiveError};
use fh_adapters::{ObjectTransport, TransportError};
use fh_core::{CacheConfig, PhaseResult, SignedUrl};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CACHE_ARCHIVE: &str = "cache.tar.gz";
const CACHE_DOWNLOAD: &str = "cache-download.tar.gz";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("cannot resolve ~/ without a home directory")]
    NoHomeDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Completed,
    Skipped,
    Failed,
}

impl CacheOutcome {
    pub fn phase_result(self) -> PhaseResult {
        match self {
            CacheOutcome::Completed => PhaseResult::Success,
            CacheOutcome::Skipped => PhaseResult::Skipped,
            CacheOutcome::Failed => PhaseResult::Fail,
        }
    }
}

pub struct CacheTransfer<T> {
    transport: T,
    project_dir: PathBuf,
    staging_dir: PathBuf,
    /// Archive entries are stored relative to this directory
    root: PathBuf,
    skip_save: bool,
}

impl<T: ObjectTransport> CacheTransfer<T> {
    pub fn new(transport: T, project_dir: PathBuf, staging_dir: PathBuf) -> Self {
        Self { transport, project_dir, staging_dir, root: PathBuf::from("/"), skip_save: false }
    }

    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = root;
        self
    }

    #[cfg(test)]
    pub fn skip_save(&self) -> bool {
        self.skip_save
    }

    pub async fn restore(&mut self, cache: &CacheConfig) -> CacheOutcome {
        if cache.disabled || cache.paths.is_empty() {
            return CacheOutcome::Skipped;
        }
        let Some(url) = cache.download_url.as_deref() else {
            tracing::info!("no saved cache to restore");
            return CacheOutcome::Skipped;
        };

        match self.try_restore(url).await {
            Ok(stats) => {
                tracing::info!(written = stats.written, skipped = stats.skipped, "cache restored");
                CacheOutcome::Completed
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to restore cache, cache save disabled for this build");
                self.skip_save = true;
                CacheOutcome::Failed
            }
        }
    }

    /// Download the saved archive into staging, extract it, and remove the
    /// download whatever the outcome.
    async fn try_restore(&self, url: &str) -> Result<archive::Extracted, CacheError> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|source| ArchiveError::Io { path: self.staging_dir.clone(), source })?;
        let download = self.staging_dir.join(CACHE_DOWNLOAD);

        let result = self.download_and_extract(url, &download).await;

        match tokio::fs::remove_file(&download).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::debug!(path = %download.display(), error = %e, "failed to remove cache download"),
        }
        result
    }

    async fn download_and_extract(&self, url: &str, download: &Path) -> Result<archive::Extracted, CacheError> {
        let size = self.transport.get_to_file(url, download).await?;
        tracing::info!(size, "cache archive downloaded");

        let root = self.root.clone();
        let download = download.to_path_buf();
        let stats = tokio::task::spawn_blocking(move || archive::extract_file_no_overwrite(&download, &root))
            .await
            .map_err(ArchiveError::from)??;
        Ok(stats)
    }

    pub async fn save(&self, cache: &CacheConfig) -> CacheOutcome {
        if self.skip_save {
            tracing::info!("skipping cache save after failed restore");
            return CacheOutcome::Skipped;
        }
        if cache.disabled || cache.paths.is_empty() {
            return CacheOutcome::Skipped;
        }
        let Some(target) = cache.upload_url.as_ref() else {
            tracing::info!("no cache upload URL, skipping cache save");
            return CacheOutcome::Skipped;
        };

        match self.try_save(&cache.paths, target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "failed to save cache");
                CacheOutcome::Failed
            }
        }
    }

    async fn try_save(&self, paths: &[String], target: &SignedUrl) -> Result<CacheOutcome, CacheError> {
        let entries = self.resolve_entries(paths)?;
        if entries.is_empty() {
            tracing::info!("none of the cache paths exist, skipping cache save");
            return Ok(CacheOutcome::Skipped);
        }

        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|source| ArchiveError::Io { path: self.staging_dir.clone(), source })?;
        let dest = self.staging_dir.join(CACHE_ARCHIVE);
        let size = {
            let dest = dest.clone();
            tokio::task::spawn_blocking(move || archive::create_tar_gz(&dest, &entries))
                .await
                .map_err(ArchiveError::from)??
        };

        let outcome = match target.content_length_range() {
            Some(range) if !range.contains(&size) => {
                tracing::warn!(
                    size,
                    min = *range.start(),
                    max = *range.end(),
                    "cache archive outside the accepted size range, not saving"
                );
                Ok(CacheOutcome::Skipped)
            }
            _ => {
                tracing::info!(size, "uploading cache archive");
                self.transport.put_file(target, &dest).await.map(|()| CacheOutcome::Completed).map_err(CacheError::from)
            }
        };

        if let Err(e) = tokio::fs::remove_file(&dest).await {
            tracing::debug!(path = %dest.display(), error = %e, "failed to remove cache archive");
        }
        outcome
    }

    /// Map configured paths to (absolute path, archive name) pairs. Paths
    /// that do not exist or lie outside the root are left out.
    fn resolve_entries(&self, paths: &[String]) -> Result<Vec<(PathBuf, PathBuf)>, CacheError> {
        let mut entries = Vec::new();
        for raw in paths {
            let path = self.resolve(raw)?;
            if !path.exists() {
                tracing::debug!(path = %path.display(), "cache path does not exist");
                continue;
            }
            match path.strip_prefix(&self.root) {
                Ok(name) if !name.as_os_str().is_empty() => entries.push((path.clone(), name.to_path_buf())),
                _ => tracing::warn!(path = %path.display(), "cache path outside cache root, ignoring"),
            }
        }
        Ok(entries)
    }

    fn resolve(&self, raw: &str) -> Result<PathBuf, CacheError> {
        if let Some(rest) = raw.strip_prefix("~/") {
            return Ok(dirs::home_dir().ok_or(CacheError::NoHomeDir)?.join(rest));
        }
        let path = Path::new(raw);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.project_dir.join(path))
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
