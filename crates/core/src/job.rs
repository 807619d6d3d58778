// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build job as dispatched by the launcher.
//!
//! The worker reads only the fields below; everything else in the job
//! payload (credentials, build profile, secrets) is carried opaquely in
//! `extra` and handed to the build runner untouched. The same goes for the
//! dispatch metadata in [`BuildRequest`].

use crate::signed_url::SignedUrl;
use serde::{Deserialize, Serialize};

/// Target platform of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

crate::simple_display! {
    Platform {
        Android => "android",
        Ios => "ios",
    }
}

/// Kind of job the runner executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    #[default]
    Build,
    Resign,
    Custom,
    Repack,
}

impl JobMode {
    /// Standard jobs run the project's own build pipeline, and with it the
    /// project's cancellation hook. Custom and repack jobs do not.
    pub fn is_standard(self) -> bool {
        matches!(self, JobMode::Build | JobMode::Resign)
    }
}

crate::simple_display! {
    JobMode {
        Build => "build",
        Resign => "resign",
        Custom => "custom",
        Repack => "repack",
    }
}

/// Build-cache settings attached to a job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default)]
    pub disabled: bool,
    /// Files and directories to cache; relative to the project directory,
    /// absolute, or `~/`-prefixed.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Where a previously saved archive can be fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Where a freshly saved archive is uploaded to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<SignedUrl>,
}

/// A dispatched build job. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub platform: Platform,
    #[serde(default)]
    pub mode: JobMode,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Job {
    pub fn new(platform: Platform) -> Self {
        Self { platform, mode: JobMode::Build, cache: CacheConfig::default(), extra: Default::default() }
    }

    pub fn with_mode(mut self, mode: JobMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

/// A job together with the dispatch context it arrived with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub job: Job,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiating_user_id: Option<String>,
    /// Opaque launcher metadata for the runner and artifact registration
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl BuildRequest {
    pub fn new(job: Job) -> Self {
        Self { job, initiating_user_id: None, metadata: serde_json::Value::Null }
    }

    pub fn with_initiating_user(mut self, user: impl Into<String>) -> Self {
        self.initiating_user_id = Some(user.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
