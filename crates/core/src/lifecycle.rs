// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle state, independent of any live connection.
//!
//! This type refuses regressions but does not decide *when* transitions are
//! legal; the orchestrator checks the current status before calling in.

use crate::artifact::Artifacts;
use crate::error::{BuildError, ExternalBuildError};
use crate::status::{AbortReason, WorkerStatus};
use serde::{Deserialize, Serialize};

/// Result recorded alongside a terminal status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub artifacts: Artifacts,
    pub external_error: Option<ExternalBuildError>,
    pub internal_error_code: Option<String>,
}

impl BuildResult {
    pub fn success(artifacts: Artifacts) -> Self {
        Self { artifacts, ..Default::default() }
    }

    /// Failed build carrying whatever partial artifacts were uploaded.
    pub fn failed(error: &BuildError, artifacts: Artifacts) -> Self {
        Self {
            artifacts,
            external_error: Some(error.external()),
            internal_error_code: Some(error.internal_code().to_string()),
        }
    }
}

/// Replayable projection of the lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub status: WorkerStatus,
    pub application_archive_name: Option<String>,
    pub build_artifacts_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_build_error: Option<ExternalBuildError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
}

#[derive(Debug, Clone)]
pub struct LifecycleState {
    status: WorkerStatus,
    result: BuildResult,
    abort_reason: Option<AbortReason>,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleState {
    pub fn new() -> Self {
        Self { status: WorkerStatus::New, result: BuildResult::default(), abort_reason: None }
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    #[cfg(test)]
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason
    }

    /// `New -> InProgress`. Returns false if the build already started.
    pub fn mark_started(&mut self) -> bool {
        if self.status != WorkerStatus::New {
            return false;
        }
        self.status = WorkerStatus::InProgress;
        true
    }

    /// Move to a terminal status and record its result. Refuses non-terminal
    /// targets and any transition out of a terminal status.
    pub fn finish(&mut self, status: WorkerStatus, result: BuildResult) -> bool {
        if !status.is_terminal() || self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.result = result;
        true
    }

    /// Record why the build is being aborted. Only while in progress, once.
    pub fn set_abort_reason(&mut self, reason: AbortReason) -> bool {
        if self.status != WorkerStatus::InProgress || self.abort_reason.is_some() {
            return false;
        }
        self.abort_reason = Some(reason);
        true
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            status: self.status,
            application_archive_name: self.result.artifacts.application_archive().map(str::to_string),
            build_artifacts_name: self.result.artifacts.build_artifacts().map(str::to_string),
            external_build_error: self.result.external_error.clone(),
            internal_error_code: self.result.internal_error_code.clone(),
            abort_reason: self.abort_reason,
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
