// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build errors with a hard split between user-facing and operator-only data.
//!
//! Only [`ExternalBuildError`] ever crosses the protocol boundary. The raw
//! inner error may contain paths, stack traces, or command output and stays
//! in worker logs.

use crate::artifact::BuildOutputs;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;

/// Stable error codes reported to the launcher.
pub mod codes {
    /// Failure with no more specific classification.
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
    /// An artifact could not be uploaded by either tier.
    pub const ARTIFACT_UPLOAD_FAILED: &str = "ARTIFACT_UPLOAD_FAILED";
    /// The build runner could not be started or returned garbage.
    pub const RUNNER_FAILED: &str = "RUNNER_FAILED";
}

/// Sanitized error shown to the end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalBuildError {
    pub error_code: String,
    pub message: String,
}

/// Typed build failure.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BuildError {
    pub error_code: String,
    pub message: String,
    /// Finer-grained code for operators, reported as `internalErrorCode`.
    pub internal_code: Option<String>,
    #[source]
    inner: Option<Box<dyn StdError + Send + Sync>>,
}

impl BuildError {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error_code: error_code.into(), message: message.into(), internal_code: None, inner: None }
    }

    /// Wrap an unexpected failure. The user sees a generic message; the
    /// original error is retained for operators only.
    pub fn unknown(inner: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(codes::UNKNOWN_ERROR, "Unknown error. See logs for more details.").with_inner(inner)
    }

    pub fn with_internal_code(mut self, code: impl Into<String>) -> Self {
        self.internal_code = Some(code.into());
        self
    }

    pub fn with_inner(mut self, inner: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.inner = Some(inner.into());
        self
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.inner.as_deref()
    }

    pub fn external(&self) -> ExternalBuildError {
        ExternalBuildError { error_code: self.error_code.clone(), message: self.message.clone() }
    }

    /// Code reported as `internalErrorCode`; falls back to the public code.
    pub fn internal_code(&self) -> &str {
        self.internal_code.as_deref().unwrap_or(&self.error_code)
    }
}

/// A failed build together with whatever outputs it produced before failing.
#[derive(Debug)]
pub struct BuildFailure {
    pub error: BuildError,
    pub outputs: BuildOutputs,
}

impl BuildFailure {
    pub fn new(error: BuildError) -> Self {
        Self { error, outputs: BuildOutputs::default() }
    }

    pub fn with_outputs(mut self, outputs: BuildOutputs) -> Self {
        self.outputs = outputs;
        self
    }
}

impl From<BuildError> for BuildFailure {
    fn from(error: BuildError) -> Self {
        Self::new(error)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
