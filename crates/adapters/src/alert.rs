// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator alerts.
//!
//! Alerts are for the people running the build farm, never for the user
//! whose build this is.

use async_trait::async_trait;
use fh_core::WorkerStatus;
use std::time::Duration;

/// Details of a worker that reported an outcome but was never told to close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HangingWorker {
    pub status: WorkerStatus,
    pub connected: bool,
    pub since_build_start: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// A launcher message referred to a different build
    BuildIdMismatch { expected: String, received: String, context: &'static str },
    /// The launcher connection failed
    ConnectionFailed { error: String },
    HangingWorker(HangingWorker),
}

fh_core::simple_display! {
    Alert {
        BuildIdMismatch { .. } => "build-id-mismatch",
        ConnectionFailed { .. } => "connection-failed",
        HangingWorker(..) => "hanging-worker",
    }
}

/// Adapter for raising operator alerts
#[async_trait]
pub trait AlertAdapter: Clone + Send + Sync + 'static {
    async fn alert(&self, alert: Alert);
}

/// Emits alerts as `error` events with `alert` set, for the log pipeline to
/// route.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAlertAdapter;

#[async_trait]
impl AlertAdapter for LogAlertAdapter {
    async fn alert(&self, alert: Alert) {
        match &alert {
            Alert::BuildIdMismatch { expected, received, context } => {
                tracing::error!(alert = %alert, %expected, %received, context, "build id mismatch");
            }
            Alert::ConnectionFailed { error } => {
                tracing::error!(alert = %alert, %error, "launcher connection failed");
            }
            Alert::HangingWorker(details) => {
                tracing::error!(
                    alert = %alert,
                    status = %details.status,
                    connected = details.connected,
                    since_build_start_ms = details.since_build_start.map(|d| d.as_millis() as u64),
                    "worker has not been closed after reporting its outcome"
                );
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{Alert, AlertAdapter};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake alert adapter that records every alert
    #[derive(Clone, Default)]
    pub struct FakeAlertAdapter {
        alerts: Arc<Mutex<Vec<Alert>>>,
    }

    impl FakeAlertAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn alerts(&self) -> Vec<Alert> {
            self.alerts.lock().clone()
        }
    }

    #[async_trait]
    impl AlertAdapter for FakeAlertAdapter {
        async fn alert(&self, alert: Alert) {
            self.alerts.lock().push(alert);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAlertAdapter;

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
