// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{CacheConfig, Job, JobMode, Platform, SignedUrl};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for lifecycle types.
pub mod strategies {
    use crate::lifecycle::BuildResult;
    use crate::status::{AbortReason, WorkerStatus};
    use crate::{ArtifactKind, Artifacts};
    use proptest::prelude::*;

    /// One lifecycle operation as the orchestrator might issue it.
    #[derive(Debug, Clone)]
    pub enum LifecycleOp {
        Start,
        Finish(WorkerStatus),
        Abort(AbortReason),
    }

    pub fn arb_status() -> impl Strategy<Value = WorkerStatus> {
        prop_oneof![
            Just(WorkerStatus::New),
            Just(WorkerStatus::InProgress),
            Just(WorkerStatus::Success),
            Just(WorkerStatus::Error),
            Just(WorkerStatus::Aborted),
        ]
    }

    pub fn arb_abort_reason() -> impl Strategy<Value = AbortReason> {
        prop_oneof![Just(AbortReason::Cancel), Just(AbortReason::Timeout)]
    }

    pub fn arb_lifecycle_op() -> impl Strategy<Value = LifecycleOp> {
        prop_oneof![
            Just(LifecycleOp::Start),
            arb_status().prop_map(LifecycleOp::Finish),
            arb_abort_reason().prop_map(LifecycleOp::Abort),
        ]
    }

    pub fn arb_result() -> impl Strategy<Value = BuildResult> {
        proptest::option::of("[a-z]{1,8}\\.apk").prop_map(|name| {
            let mut artifacts = Artifacts::new();
            if let Some(name) = name {
                artifacts.insert(ArtifactKind::ApplicationArchive, name);
            }
            BuildResult::success(artifacts)
        })
    }
}

// ── Job fixtures ────────────────────────────────────────────────────────

pub fn android_job() -> Job {
    Job::new(Platform::Android)
}

pub fn ios_job() -> Job {
    Job::new(Platform::Ios)
}

pub fn custom_job() -> Job {
    Job::new(Platform::Android).with_mode(JobMode::Custom)
}

/// Android job with cache paths and both cache URLs configured.
pub fn cached_android_job(paths: &[&str], max_size: u64) -> Job {
    android_job().with_cache(CacheConfig {
        disabled: false,
        paths: paths.iter().map(|p| p.to_string()).collect(),
        download_url: Some("https://storage.test/cache/download".to_string()),
        upload_url: Some(
            SignedUrl::new("https://storage.test/cache/upload")
                .with_header(crate::signed_url::CONTENT_LENGTH_RANGE_HEADER, format!("0,{}", max_size)),
        ),
    })
}
