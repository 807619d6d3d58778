// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hanging-worker watchdog.
//!
//! Armed once the worker reports its outcome. If the launcher still has not
//! sent `close` when the grace period runs out, operators get an alert. The
//! worker itself keeps running.

use fh_adapters::{Alert, AlertAdapter, HangingWorker};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Single-shot timer; dropping it disarms it.
pub struct Watchdog {
    task: JoinHandle<()>,
}

impl Watchdog {
    /// Start the timer. `inspect` runs on expiry and returns `None` when the
    /// worker is no longer hanging.
    pub fn start<N, F>(grace: Duration, alerts: N, inspect: F) -> Self
    where
        N: AlertAdapter,
        F: FnOnce() -> Option<HangingWorker> + Send + 'static,
    {
        tracing::debug!(grace_ms = grace.as_millis() as u64, "hanging-worker watchdog armed");
        let task = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            match inspect() {
                Some(details) => alerts.alert(Alert::HangingWorker(details)).await,
                None => tracing::debug!("watchdog expired after close"),
            }
        });
        Self { task }
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
