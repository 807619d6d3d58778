// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build orchestrator.
//!
//! Owns the lifecycle state of the one build this worker runs and answers
//! every launcher message. The build itself runs as a spawned pipeline task
//! that the orchestrator stops waiting for on `abort`.

mod pipeline;

use crate::config::Config;
use crate::connection::{ConnectionError, ConnectionHandle, HandlerError, MessageHandler};
use crate::listener::ConnectionOwner;
use crate::upload::FALLBACK_ATTEMPTS;
use crate::watchdog::Watchdog;
use async_trait::async_trait;
use fh_adapters::{Alert, AlertAdapter, BuildApi, BuildRunner, HangingWorker, ObjectTransport};
use fh_core::{
    AbortReason, ArtifactKind, BuildId, BuildPhase, BuildRequest, BuildResult, Clock, LifecycleState, PhaseResult,
    SignedUrl, StateSnapshot, WorkerStatus,
};
use fh_wire::{LauncherMessage, WorkerMessage};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// External collaborators the orchestrator drives.
pub struct WorkerDeps<A, T, R, N> {
    pub api: A,
    pub transport: T,
    pub runner: R,
    pub alerts: N,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub build_id: BuildId,
    pub project_dir: PathBuf,
    /// Scratch space for archives awaiting upload
    pub staging_dir: PathBuf,
    pub fallback_urls: BTreeMap<ArtifactKind, SignedUrl>,
    pub fallback_attempts: u32,
    pub hanging_worker_grace: Duration,
    /// Directory cache archive entries are relative to
    pub cache_root: PathBuf,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            build_id: config.build_id.clone(),
            project_dir: config.project_dir.clone(),
            staging_dir: std::env::temp_dir().join(format!("fhd-{}", config.build_id)),
            fallback_urls: config.fallback_upload_urls.clone(),
            fallback_attempts: FALLBACK_ATTEMPTS,
            hanging_worker_grace: config.hanging_worker_grace,
            cache_root: PathBuf::from("/"),
        }
    }
}

pub struct Orchestrator<A, T, R, N, C: Clock> {
    me: Weak<Self>,
    deps: WorkerDeps<A, T, R, N>,
    settings: WorkerSettings,
    clock: C,
    state: Mutex<LifecycleState>,
    /// Taken by the first matching dispatch
    started: AtomicBool,
    request: OnceLock<BuildRequest>,
    started_at: Mutex<Option<Instant>>,
    abort: CancellationToken,
    may_exit: AtomicBool,
    connection: Mutex<Option<ConnectionHandle>>,
    exit: Notify,
    watchdog: Mutex<Option<Watchdog>>,
}

impl<A, T, R, N, C> Orchestrator<A, T, R, N, C>
where
    A: BuildApi,
    T: ObjectTransport,
    R: BuildRunner,
    N: AlertAdapter,
    C: Clock,
{
    pub fn new(deps: WorkerDeps<A, T, R, N>, settings: WorkerSettings, clock: C) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            deps,
            settings,
            clock,
            state: Mutex::new(LifecycleState::new()),
            started: AtomicBool::new(false),
            request: OnceLock::new(),
            started_at: Mutex::new(None),
            abort: CancellationToken::new(),
            may_exit: AtomicBool::new(false),
            connection: Mutex::new(None),
            exit: Notify::new(),
            watchdog: Mutex::new(None),
        })
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.lock().snapshot()
    }

    pub fn status(&self) -> WorkerStatus {
        self.state.lock().status()
    }

    pub fn may_exit(&self) -> bool {
        self.may_exit.load(Ordering::Acquire)
    }

    fn live_connection(&self) -> Option<ConnectionHandle> {
        self.connection.lock().as_ref().filter(|c| !c.is_closed()).cloned()
    }

    /// Queue a message on the live connection, if there is one.
    async fn send(&self, msg: WorkerMessage) -> bool {
        match self.live_connection() {
            Some(conn) => {
                conn.send(msg).await;
                true
            }
            None => {
                debug!(kind = msg.kind(), "no launcher connection, message not sent");
                false
            }
        }
    }

    async fn report_phase(&self, phase: BuildPhase, result: PhaseResult, started: Instant) {
        let duration_ms = u64::try_from(self.clock.since(started).as_millis()).unwrap_or(u64::MAX);
        info!(%phase, %result, duration_ms, "build phase finished");
        self.send(WorkerMessage::BuildPhaseStats { build_phase: phase, result, duration_ms }).await;
    }

    /// Send the outcome of the build and start waiting for `close`.
    async fn send_terminal(&self, msg: WorkerMessage) {
        let kind = msg.kind();
        if self.send(msg).await {
            info!(kind, "reported build outcome");
        } else {
            info!(kind, "launcher not connected, outcome available via state-query");
        }
        self.arm_watchdog();
    }

    fn arm_watchdog(&self) {
        if self.may_exit() {
            return;
        }
        let me = self.me.clone();
        let dog = Watchdog::start(self.settings.hanging_worker_grace, self.deps.alerts.clone(), move || {
            me.upgrade().and_then(|orchestrator| orchestrator.hanging_details())
        });
        *self.watchdog.lock() = Some(dog);
    }

    fn hanging_details(&self) -> Option<HangingWorker> {
        if self.may_exit() {
            return None;
        }
        Some(HangingWorker {
            status: self.status(),
            connected: self.is_connected(),
            since_build_start: self.started_at.lock().map(|at| self.clock.since(at)),
        })
    }

    async fn check_build_id(&self, received: &BuildId, context: &'static str) -> bool {
        if *received == self.settings.build_id {
            return true;
        }
        warn!(expected = %self.settings.build_id, %received, context, "message for another build");
        self.deps
            .alerts
            .alert(Alert::BuildIdMismatch {
                expected: self.settings.build_id.to_string(),
                received: received.to_string(),
                context,
            })
            .await;
        false
    }

    fn on_dispatch(&self, request: BuildRequest) {
        if self.started.swap(true, Ordering::AcqRel) {
            debug!("build already dispatched, ignoring");
            return;
        }
        let Some(me) = self.me.upgrade() else {
            return;
        };

        *self.started_at.lock() = Some(self.clock.now());
        let request = self.request.get_or_init(|| request).clone();
        self.state.lock().mark_started();
        info!(
            platform = %request.job.platform,
            mode = %request.job.mode,
            user = request.initiating_user_id.as_deref(),
            "build dispatched"
        );

        tokio::spawn(async move {
            let abort = me.abort.clone();
            tokio::select! {
                _ = abort.cancelled() => info!("stopped waiting for aborted build"),
                outcome = me.execute(&request) => me.complete(outcome).await,
            }
        });
    }

    async fn on_abort(&self, reason: AbortReason) {
        {
            let mut state = self.state.lock();
            if state.status() != WorkerStatus::InProgress {
                debug!(%reason, status = %state.status(), "abort ignored");
                return;
            }
            state.set_abort_reason(reason);
            state.finish(WorkerStatus::Aborted, BuildResult::default());
        }
        self.abort.cancel();
        info!(%reason, "build aborted");

        let Some(me) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            if reason == AbortReason::Cancel {
                me.run_cancel_hook().await;
            }
            me.send_terminal(WorkerMessage::Aborted { reason }).await;
        });
    }

    async fn run_cancel_hook(&self) {
        let Some(request) = self.request.get() else {
            return;
        };
        if !request.job.mode.is_standard() {
            debug!(mode = %request.job.mode, "no cancel hook for this job mode");
            return;
        }
        let started = self.clock.now();
        let result = match self.deps.runner.run_cancel_hook(request).await {
            Ok(()) => PhaseResult::Success,
            Err(e) => {
                warn!(error = %e, "cancel hook failed");
                PhaseResult::Fail
            }
        };
        self.report_phase(BuildPhase::OnBuildCancelHook, result, started).await;
    }

    fn on_close(&self) {
        info!("launcher sent close, worker may exit");
        self.may_exit.store(true, Ordering::Release);
        self.watchdog.lock().take();
        if let Some(conn) = self.live_connection() {
            conn.close();
        }
        self.exit.notify_waiters();
    }

    fn on_state_query(&self) -> WorkerMessage {
        let snapshot = self.snapshot();
        debug!(status = %snapshot.status, "answering state query");
        WorkerMessage::StateResponse(snapshot)
    }
}

#[async_trait]
impl<A, T, R, N, C> MessageHandler for Orchestrator<A, T, R, N, C>
where
    A: BuildApi,
    T: ObjectTransport,
    R: BuildRunner,
    N: AlertAdapter,
    C: Clock,
{
    async fn handle(&self, msg: LauncherMessage, _conn: &ConnectionHandle) -> Result<Option<WorkerMessage>, HandlerError> {
        if let Some(build_id) = msg.build_id() {
            if !self.check_build_id(build_id, msg.kind()).await {
                return Ok(None);
            }
        }
        let reply = match msg {
            LauncherMessage::Dispatch { job, initiating_user_id, metadata, .. } => {
                let mut request = BuildRequest::new(job).with_metadata(metadata);
                request.initiating_user_id = initiating_user_id;
                self.on_dispatch(request);
                None
            }
            LauncherMessage::Abort { reason } => {
                self.on_abort(reason).await;
                None
            }
            LauncherMessage::Close => {
                self.on_close();
                None
            }
            LauncherMessage::StateQuery { .. } => Some(self.on_state_query()),
        };
        Ok(reply)
    }

    async fn on_error(&self, conn: &ConnectionHandle, error: &ConnectionError) {
        warn!(connection = conn.id(), error = %error, "launcher connection failed");
        self.deps.alerts.alert(Alert::ConnectionFailed { error: error.to_string() }).await;
    }
}

#[async_trait]
impl<A, T, R, N, C> ConnectionOwner for Orchestrator<A, T, R, N, C>
where
    A: BuildApi,
    T: ObjectTransport,
    R: BuildRunner,
    N: AlertAdapter,
    C: Clock,
{
    fn is_connected(&self) -> bool {
        self.live_connection().is_some()
    }

    fn attach(&self, conn: ConnectionHandle) {
        *self.connection.lock() = Some(conn);
    }

    fn detach(&self, id: u64) {
        {
            let mut slot = self.connection.lock();
            if slot.as_ref().is_some_and(|c| c.id() == id) {
                *slot = None;
            }
        }
        self.exit.notify_waiters();
    }

    async fn wait_for_exit(&self) {
        loop {
            let notified = self.exit.notified();
            if self.may_exit() && !self.is_connected() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
