// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fh_core::{AbortReason, BuildId, Job};
use serde::{Deserialize, Serialize};

/// Message from the launcher to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum LauncherMessage {
    /// Hand the worker its one job
    Dispatch {
        build_id: BuildId,
        job: Job,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initiating_user_id: Option<String>,
        /// Opaque build metadata, forwarded to the runner and registered with
        /// uploaded artifacts
        #[serde(default)]
        metadata: serde_json::Value,
    },

    /// Stop waiting for the build and report it aborted
    Abort { reason: AbortReason },

    /// The launcher has everything it needs; the worker may exit
    Close,

    /// Ask for the current state after a reconnect
    StateQuery { build_id: BuildId },
}

impl LauncherMessage {
    /// Wire name of the message, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LauncherMessage::Dispatch { .. } => "dispatch",
            LauncherMessage::Abort { .. } => "abort",
            LauncherMessage::Close => "close",
            LauncherMessage::StateQuery { .. } => "state-query",
        }
    }

    /// Build id the message refers to, if it carries one.
    pub fn build_id(&self) -> Option<&BuildId> {
        match self {
            LauncherMessage::Dispatch { build_id, .. } | LauncherMessage::StateQuery { build_id } => {
                Some(build_id)
            }
            LauncherMessage::Abort { .. } | LauncherMessage::Close => None,
        }
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
