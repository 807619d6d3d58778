// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use crate::config::{Config, ConfigError};

/// Build this worker is bound to (required)
pub const BUILD_ID: &str = "FH_BUILD_ID";
/// Address the launcher connects to
pub const LISTEN_ADDR: &str = "FH_LISTEN_ADDR";
/// Base URL of the build-management API
pub const API_URL: &str = "FH_API_URL";
/// Bearer token for the build-management API
pub const ACCESS_TOKEN: &str = "FH_ACCESS_TOKEN";
/// JSON map of artifact kind to fallback signed URL
pub const FALLBACK_UPLOAD_URLS: &str = "FH_FALLBACK_UPLOAD_URLS";
/// Project checkout the build runs in
pub const PROJECT_DIR: &str = "FH_PROJECT_DIR";
/// Build runner executable (required)
pub const RUNNER: &str = "FH_RUNNER";
/// Keepalive ping interval in milliseconds
pub const PING_INTERVAL_MS: &str = "FH_PING_INTERVAL_MS";
/// Hanging-worker grace period in milliseconds
pub const HANGING_WORKER_GRACE_MS: &str = "FH_HANGING_WORKER_GRACE_MS";
/// Tracing filter directives
pub const LOG: &str = "FH_LOG";
/// Optional log file path
pub const LOG_FILE: &str = "FH_LOG_FILE";

/// Load daemon configuration from the process environment.
pub fn load() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(ConfigError::NoProjectDir)?;
    Config::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()), cwd)
}
