// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named, timed sub-steps of a build reported as telemetry.

use crate::artifact::ArtifactKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildPhase {
    RestoreCache,
    Build,
    SaveCache,
    UploadApplicationArchive,
    UploadBuildArtifacts,
    UploadBuildLogs,
    UploadWorkflowArtifact,
    OnBuildCancelHook,
}

impl BuildPhase {
    /// Phase under which an artifact of the given kind is uploaded.
    pub fn for_upload(kind: &ArtifactKind) -> Self {
        match kind {
            ArtifactKind::ApplicationArchive => BuildPhase::UploadApplicationArchive,
            ArtifactKind::BuildArtifacts => BuildPhase::UploadBuildArtifacts,
            ArtifactKind::BuildLogs => BuildPhase::UploadBuildLogs,
            ArtifactKind::Workflow(_) => BuildPhase::UploadWorkflowArtifact,
        }
    }
}

crate::simple_display! {
    BuildPhase {
        RestoreCache => "restore-cache",
        Build => "build",
        SaveCache => "save-cache",
        UploadApplicationArchive => "upload-application-archive",
        UploadBuildArtifacts => "upload-build-artifacts",
        UploadBuildLogs => "upload-build-logs",
        UploadWorkflowArtifact => "upload-workflow-artifact",
        OnBuildCancelHook => "on-build-cancel-hook",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseResult {
    Success,
    Fail,
    Skipped,
}

crate::simple_display! {
    PhaseResult {
        Success => "success",
        Fail => "fail",
        Skipped => "skipped",
    }
}
