// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact uploader.
//!
//! Tier 1 is a managed upload: open an upload session, PUT to its signed
//! URL, register the bucket key. When any tier-1 step fails and a fallback
//! URL is configured for the artifact kind, the packaged file is PUT to the
//! fallback and the launcher receives the plain file name instead.

use crate::archive::{self, ArchiveError, Packaged};
use fh_adapters::{ApiError, BuildApi, ObjectTransport, SaveArtifactRequest, TransportError, UploadSessionRequest};
use fh_core::{ArtifactKind, SignedUrl};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Fallback uploads attempted after tier 1 fails.
pub const FALLBACK_ATTEMPTS: u32 = 1;

#[derive(Debug, Error)]
pub enum UploadError {
    /// Packaging failed; never retried
    #[error("failed to package artifact: {0}")]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("upload to signed URL failed: {0}")]
    Transport(#[from] TransportError),

    #[error("fallback upload failed after {primary}: {source}")]
    Fallback {
        primary: Box<UploadError>,
        #[source]
        source: TransportError,
    },
}

pub struct ArtifactUploader<A, T> {
    api: A,
    transport: T,
    staging_dir: PathBuf,
    fallback_urls: BTreeMap<ArtifactKind, SignedUrl>,
    fallback_attempts: u32,
}

impl<A, T> ArtifactUploader<A, T>
where
    A: BuildApi,
    T: ObjectTransport,
{
    pub fn new(api: A, transport: T, staging_dir: PathBuf) -> Self {
        Self { api, transport, staging_dir, fallback_urls: BTreeMap::new(), fallback_attempts: FALLBACK_ATTEMPTS }
    }

    pub fn with_fallback_urls(mut self, urls: BTreeMap<ArtifactKind, SignedUrl>) -> Self {
        self.fallback_urls = urls;
        self
    }

    pub fn with_fallback_attempts(mut self, attempts: u32) -> Self {
        self.fallback_attempts = attempts;
        self
    }

    /// Upload the files of one artifact and return its reference: the
    /// registered bucket key, or the local file name after a fallback upload.
    /// `metadata` is registered with a managed upload.
    pub async fn upload(
        &self,
        kind: &ArtifactKind,
        paths: &[PathBuf],
        metadata: &serde_json::Value,
    ) -> Result<String, UploadError> {
        let packaged = archive::package(paths, &self.staging_dir, &kind.archive_stem()).await?;
        tracing::info!(%kind, file = %packaged.file_name, size = packaged.size, "uploading artifact");

        let result = self.upload_packaged(kind, &packaged, metadata).await;
        packaged.cleanup().await;
        result
    }

    async fn upload_packaged(
        &self,
        kind: &ArtifactKind,
        packaged: &Packaged,
        metadata: &serde_json::Value,
    ) -> Result<String, UploadError> {
        let primary = match self.managed_upload(kind, packaged, metadata).await {
            Ok(bucket_key) => return Ok(bucket_key),
            Err(e) => e,
        };

        let Some(fallback) = self.fallback_urls.get(kind) else {
            return Err(primary);
        };
        tracing::warn!(%kind, error = %primary, "managed upload failed, using fallback URL");

        let mut last = None;
        for attempt in 1..=self.fallback_attempts {
            match self.transport.put_file(fallback, &packaged.path).await {
                Ok(()) => return Ok(packaged.file_name.clone()),
                Err(e) => {
                    tracing::warn!(%kind, attempt, error = %e, "fallback upload failed");
                    last = Some(e);
                }
            }
        }
        match last {
            Some(source) => Err(UploadError::Fallback { primary: Box::new(primary), source }),
            None => Err(primary),
        }
    }

    async fn managed_upload(
        &self,
        kind: &ArtifactKind,
        packaged: &Packaged,
        metadata: &serde_json::Value,
    ) -> Result<String, UploadError> {
        let session = self
            .api
            .create_upload_session(UploadSessionRequest {
                filename: packaged.file_name.clone(),
                name: kind.to_string(),
                size: packaged.size,
            })
            .await?;

        self.transport.put_file(&session.signed_url(), &packaged.path).await?;
        let registration = SaveArtifactRequest::for_session(kind.to_string(), &session).with_metadata(metadata.clone());
        self.api.save_artifact(registration).await?;

        tracing::info!(%kind, bucket_key = %session.bucket_key, "artifact registered");
        Ok(session.bucket_key)
    }
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
