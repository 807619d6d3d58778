// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fh_core::{AbortReason, BuildPhase, ExternalBuildError, PhaseResult, StateSnapshot};
use serde::{Deserialize, Serialize};

/// Message from the worker to the launcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WorkerMessage {
    Success {
        application_archive_name: Option<String>,
        build_artifacts_name: Option<String>,
    },

    /// Build failed; names refer to whatever partial artifacts were uploaded
    Error {
        application_archive_name: Option<String>,
        build_artifacts_name: Option<String>,
        external_build_error: ExternalBuildError,
        internal_error_code: Option<String>,
    },

    Aborted { reason: AbortReason },

    /// Reply to `state-query`
    StateResponse(StateSnapshot),

    /// Telemetry for one finished phase
    BuildPhaseStats { build_phase: BuildPhase, result: PhaseResult, duration_ms: u64 },
}

impl WorkerMessage {
    /// Wire name of the message, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerMessage::Success { .. } => "success",
            WorkerMessage::Error { .. } => "error",
            WorkerMessage::Aborted { .. } => "aborted",
            WorkerMessage::StateResponse(_) => "state-response",
            WorkerMessage::BuildPhaseStats { .. } => "build-phase-stats",
        }
    }

    /// Whether this message reports the final outcome of the build.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerMessage::Success { .. } | WorkerMessage::Error { .. } | WorkerMessage::Aborted { .. })
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
