// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.

use crate::env;
use fh_core::{ArtifactKind, BuildId, SignedUrl};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3005";
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);
/// How long a worker may wait for `close` after reporting its outcome
/// before operators are alerted.
pub const DEFAULT_HANGING_WORKER_GRACE: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Errors from loading configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("cannot determine project directory: {0}")]
    NoProjectDir(#[source] std::io::Error),
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub build_id: BuildId,
    pub listen_addr: SocketAddr,
    /// Missing API settings are not fatal here; uploads report them as
    /// setup errors when first used.
    pub api_url: Option<String>,
    pub access_token: Option<String>,
    pub fallback_upload_urls: BTreeMap<ArtifactKind, SignedUrl>,
    pub project_dir: PathBuf,
    pub runner: PathBuf,
    pub ping_interval: Duration,
    pub hanging_worker_grace: Duration,
    pub log_filter: String,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Build configuration from a variable lookup. `cwd` is the project
    /// directory when none is configured.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, cwd: PathBuf) -> Result<Self, ConfigError> {
        let build_id = lookup(env::BUILD_ID).ok_or(ConfigError::Missing(env::BUILD_ID))?;
        let runner = lookup(env::RUNNER).ok_or(ConfigError::Missing(env::RUNNER))?;

        let listen_addr = lookup(env::LISTEN_ADDR)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid { var: env::LISTEN_ADDR, reason: e.to_string() })?;

        let fallback_upload_urls = match lookup(env::FALLBACK_UPLOAD_URLS) {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| ConfigError::Invalid { var: env::FALLBACK_UPLOAD_URLS, reason: e.to_string() })?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            build_id: BuildId::new(build_id),
            listen_addr,
            api_url: lookup(env::API_URL),
            access_token: lookup(env::ACCESS_TOKEN),
            fallback_upload_urls,
            project_dir: lookup(env::PROJECT_DIR).map(PathBuf::from).unwrap_or(cwd),
            runner: PathBuf::from(runner),
            ping_interval: millis(&lookup, env::PING_INTERVAL_MS)?.unwrap_or(DEFAULT_PING_INTERVAL),
            hanging_worker_grace: millis(&lookup, env::HANGING_WORKER_GRACE_MS)?
                .unwrap_or(DEFAULT_HANGING_WORKER_GRACE),
            log_filter: lookup(env::LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_file: lookup(env::LOG_FILE).map(PathBuf::from),
        })
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid { var, reason: "must be greater than zero".to_string() }),
        Ok(ms) => Ok(Some(Duration::from_millis(ms))),
        Err(e) => Err(ConfigError::Invalid { var, reason: e.to_string() }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
