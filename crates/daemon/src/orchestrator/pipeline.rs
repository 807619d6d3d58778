// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build pipeline: restore cache, build, save cache, upload outputs.

use super::Orchestrator;
use crate::cache::CacheTransfer;
use crate::upload::{ArtifactUploader, UploadError};
use fh_adapters::{AlertAdapter, BuildApi, BuildRunner, ObjectTransport};
use fh_core::{
    codes, ArtifactKind, Artifacts, BuildError, BuildOutputs, BuildPhase, BuildRequest, BuildResult, Clock, PhaseResult,
    WorkerStatus,
};
use fh_wire::WorkerMessage;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// How a pipeline run ended.
#[derive(Debug)]
pub(super) enum Outcome {
    Succeeded(Artifacts),
    /// Carries whatever artifacts were uploaded before or despite the failure
    Failed(BuildError, Artifacts),
}

fn phase_result<V, E>(result: &Result<V, E>) -> PhaseResult {
    match result {
        Ok(_) => PhaseResult::Success,
        Err(_) => PhaseResult::Fail,
    }
}

impl<A, T, R, N, C> Orchestrator<A, T, R, N, C>
where
    A: BuildApi,
    T: ObjectTransport,
    R: BuildRunner,
    N: AlertAdapter,
    C: Clock,
{
    pub(super) async fn execute(&self, request: &BuildRequest) -> Outcome {
        let job = &request.job;
        let mut cache = CacheTransfer::new(
            self.deps.transport.clone(),
            self.settings.project_dir.clone(),
            self.settings.staging_dir.join("cache"),
        )
        .with_root(self.settings.cache_root.clone());

        let started = self.clock.now();
        let restored = cache.restore(&job.cache).await;
        self.report_phase(BuildPhase::RestoreCache, restored.phase_result(), started).await;

        let started = self.clock.now();
        let built = self.deps.runner.run_build(request).await;
        self.report_phase(BuildPhase::Build, phase_result(&built), started).await;

        match built {
            Ok(outputs) => {
                let started = self.clock.now();
                let saved = cache.save(&job.cache).await;
                self.report_phase(BuildPhase::SaveCache, saved.phase_result(), started).await;
                self.upload_outputs(&outputs, &request.metadata).await
            }
            Err(failure) => {
                warn!(error_code = %failure.error.error_code, error = %failure.error, "build failed");
                let artifacts = self.upload_partial(&failure.outputs, &request.metadata).await;
                Outcome::Failed(failure.error, artifacts)
            }
        }
    }

    fn uploader(&self) -> ArtifactUploader<A, T> {
        ArtifactUploader::new(self.deps.api.clone(), self.deps.transport.clone(), self.settings.staging_dir.clone())
            .with_fallback_urls(self.settings.fallback_urls.clone())
            .with_fallback_attempts(self.settings.fallback_attempts)
    }

    /// Upload every output of a successful build. The first failed upload
    /// fails the build.
    async fn upload_outputs(&self, outputs: &BuildOutputs, metadata: &serde_json::Value) -> Outcome {
        let uploader = self.uploader();
        let mut artifacts = Artifacts::new();
        for (kind, paths) in outputs.iter() {
            match self.upload_one(&uploader, kind, paths, metadata).await {
                Ok(reference) => artifacts.insert(kind.clone(), reference),
                Err(e) => {
                    let error =
                        BuildError::new(codes::ARTIFACT_UPLOAD_FAILED, format!("Failed to upload {kind}.")).with_inner(e);
                    return Outcome::Failed(error, artifacts);
                }
            }
        }
        Outcome::Succeeded(artifacts)
    }

    /// Upload what a failed build left behind; failures are only logged.
    async fn upload_partial(&self, outputs: &BuildOutputs, metadata: &serde_json::Value) -> Artifacts {
        let uploader = self.uploader();
        let mut artifacts = Artifacts::new();
        for (kind, paths) in outputs.iter() {
            match self.upload_one(&uploader, kind, paths, metadata).await {
                Ok(reference) => artifacts.insert(kind.clone(), reference),
                Err(e) => warn!(%kind, error = %e, "failed to upload partial artifact"),
            }
        }
        artifacts
    }

    async fn upload_one(
        &self,
        uploader: &ArtifactUploader<A, T>,
        kind: &ArtifactKind,
        paths: &[PathBuf],
        metadata: &serde_json::Value,
    ) -> Result<String, UploadError> {
        let started = self.clock.now();
        let result = uploader.upload(kind, paths, metadata).await;
        self.report_phase(BuildPhase::for_upload(kind), phase_result(&result), started).await;
        result
    }

    /// Record the outcome unless an abort got there first, then report it.
    pub(super) async fn complete(&self, outcome: Outcome) {
        let (status, result, msg) = match outcome {
            Outcome::Succeeded(artifacts) => {
                let msg = WorkerMessage::Success {
                    application_archive_name: artifacts.application_archive().map(str::to_string),
                    build_artifacts_name: artifacts.build_artifacts().map(str::to_string),
                };
                (WorkerStatus::Success, BuildResult::success(artifacts), msg)
            }
            Outcome::Failed(build_error, artifacts) => {
                error!(
                    error_code = %build_error.error_code,
                    internal_code = build_error.internal_code(),
                    cause = ?build_error.inner(),
                    "{build_error}"
                );
                let msg = WorkerMessage::Error {
                    application_archive_name: artifacts.application_archive().map(str::to_string),
                    build_artifacts_name: artifacts.build_artifacts().map(str::to_string),
                    external_build_error: build_error.external(),
                    internal_error_code: Some(build_error.internal_code().to_string()),
                };
                (WorkerStatus::Error, BuildResult::failed(&build_error, artifacts), msg)
            }
        };

        if !self.state.lock().finish(status, result) {
            info!(%status, "build already finished, dropping pipeline outcome");
            return;
        }
        info!(%status, "build finished");
        self.send_terminal(msg).await;
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
