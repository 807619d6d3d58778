// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapters for the worker's external collaborators

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod alert;
pub mod api;
pub mod runner;
pub mod transport;

pub use alert::{Alert, AlertAdapter, HangingWorker, LogAlertAdapter};
pub use api::{ApiError, BuildApi, HttpBuildApi, SaveArtifactRequest, UploadSession, UploadSessionRequest};
pub use runner::{BuildRunner, CommandRunner, RunnerError, RunnerReport};
pub use transport::{HttpTransport, ObjectTransport, TransportError};

#[cfg(any(test, feature = "test-support"))]
pub use alert::FakeAlertAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use api::{ApiCall, FakeBuildApi};
#[cfg(any(test, feature = "test-support"))]
pub use runner::FakeBuildRunner;
#[cfg(any(test, feature = "test-support"))]
pub use transport::{FakeTransport, PutCall};
