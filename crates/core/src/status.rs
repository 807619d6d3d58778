// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker status and abort reasons.

use serde::{Deserialize, Serialize};

/// Status of the build owned by this worker.
///
/// `New -> InProgress -> {Success, Error, Aborted}`. Terminal values never
/// regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerStatus {
    New,
    InProgress,
    Success,
    Error,
    Aborted,
}

impl WorkerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerStatus::Success | WorkerStatus::Error | WorkerStatus::Aborted)
    }
}

crate::simple_display! {
    WorkerStatus {
        New => "new",
        InProgress => "in-progress",
        Success => "success",
        Error => "error",
        Aborted => "aborted",
    }
}

/// Why the launcher aborted the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortReason {
    /// A user cancelled the build
    Cancel,
    /// The launcher decided the build ran too long
    Timeout,
}

crate::simple_display! {
    AbortReason {
        Cancel => "cancel",
        Timeout => "timeout",
    }
}
