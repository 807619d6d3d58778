// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Farmhand worker daemon library
//!
//! Everything `fhd` is made of, exposed so the end-to-end tests can drive a
//! worker over a real socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod archive;
pub mod cache;
pub mod config;
pub mod connection;
pub mod env;
pub mod listener;
pub mod logging;
pub mod orchestrator;
pub mod upload;
pub mod watchdog;

pub use cache::{CacheError, CacheOutcome, CacheTransfer};
pub use config::{Config, ConfigError};
pub use connection::{ConnectionConfig, ConnectionError, ConnectionHandle, MessageHandler};
pub use listener::{ConnectionOwner, Listener};
pub use orchestrator::{Orchestrator, WorkerDeps, WorkerSettings};
pub use upload::{ArtifactUploader, UploadError};
pub use watchdog::Watchdog;
