// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fh-core: domain types for the Farmhand build worker

pub mod macros;

pub mod artifact;
pub mod clock;
pub mod error;
pub mod id;
pub mod job;
pub mod lifecycle;
pub mod phase;
pub mod signed_url;
pub mod status;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use artifact::{ArtifactKind, Artifacts, BuildOutputs};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{codes, BuildError, BuildFailure, ExternalBuildError};
pub use id::BuildId;
pub use job::{BuildRequest, CacheConfig, Job, JobMode, Platform};
pub use lifecycle::{BuildResult, LifecycleState, StateSnapshot};
pub use phase::{BuildPhase, PhaseResult};
pub use signed_url::SignedUrl;
pub use status::{AbortReason, WorkerStatus};
