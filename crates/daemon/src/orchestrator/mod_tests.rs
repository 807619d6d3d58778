// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::connection::{capture, Op};
use fh_adapters::{FakeAlertAdapter, FakeBuildApi, FakeBuildRunner, FakeTransport};
use fh_core::test_support::{android_job, custom_job, ios_job};
use fh_core::{BuildOutputs, FakeClock, Job};
use fh_wire::ProtocolError;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub(super) const BUILD_ID: &str = "build-1";

pub(super) type TestOrchestrator =
    Orchestrator<FakeBuildApi, FakeTransport, FakeBuildRunner, FakeAlertAdapter, FakeClock>;

pub(super) struct Fixture {
    pub api: FakeBuildApi,
    pub transport: FakeTransport,
    pub runner: FakeBuildRunner,
    pub alerts: FakeAlertAdapter,
    pub clock: FakeClock,
    pub orchestrator: Arc<TestOrchestrator>,
    pub conn: ConnectionHandle,
    pub ops: mpsc::Receiver<Op>,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(true, |_| {})
    }

    /// No launcher connection attached.
    pub fn detached() -> Self {
        Self::build(false, |_| {})
    }

    pub fn with_settings(configure: impl FnOnce(&mut WorkerSettings)) -> Self {
        Self::build(true, configure)
    }

    fn build(attach: bool, configure: impl FnOnce(&mut WorkerSettings)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut settings = WorkerSettings {
            build_id: BuildId::new(BUILD_ID),
            project_dir: dir.path().join("project"),
            staging_dir: dir.path().join("staging"),
            fallback_urls: BTreeMap::new(),
            fallback_attempts: FALLBACK_ATTEMPTS,
            hanging_worker_grace: Duration::from_secs(300),
            cache_root: dir.path().to_path_buf(),
        };
        configure(&mut settings);
        std::fs::create_dir_all(&settings.project_dir).unwrap();

        let api = FakeBuildApi::new();
        let transport = FakeTransport::new();
        let runner = FakeBuildRunner::new();
        let alerts = FakeAlertAdapter::new();
        let clock = FakeClock::new();
        let orchestrator = Orchestrator::new(
            WorkerDeps { api: api.clone(), transport: transport.clone(), runner: runner.clone(), alerts: alerts.clone() },
            settings,
            clock.clone(),
        );
        let (conn, ops) = capture(64);
        if attach {
            orchestrator.attach(conn.clone());
        }
        Self { api, transport, runner, alerts, clock, orchestrator, conn, ops, dir }
    }

    /// Write a file under the project directory.
    pub fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join("project").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub async fn deliver(&self, msg: LauncherMessage) -> Option<WorkerMessage> {
        self.orchestrator.handle(msg, &self.conn).await.unwrap()
    }

    pub async fn dispatch(&self, job: Job) {
        self.dispatch_request(BuildRequest::new(job).with_initiating_user("user-1")).await;
    }

    pub async fn dispatch_request(&self, request: BuildRequest) {
        let reply = self
            .deliver(LauncherMessage::Dispatch {
                build_id: BuildId::new(BUILD_ID),
                job: request.job,
                initiating_user_id: request.initiating_user_id,
                metadata: request.metadata,
            })
            .await;
        assert_eq!(reply, None);
    }

    pub async fn query(&self) -> StateSnapshot {
        match self.deliver(LauncherMessage::StateQuery { build_id: BuildId::new(BUILD_ID) }).await {
            Some(WorkerMessage::StateResponse(snapshot)) => snapshot,
            other => panic!("expected state-response, got {other:?}"),
        }
    }

    pub async fn next_sent(&mut self) -> WorkerMessage {
        loop {
            let op = tokio::time::timeout(Duration::from_secs(5), self.ops.recv())
                .await
                .expect("timed out waiting for a message")
                .expect("connection queue closed");
            if let Op::Send(msg) = op {
                return msg;
            }
        }
    }

    /// Collect phase stats until the terminal message arrives.
    pub async fn until_terminal(&mut self) -> (Vec<(BuildPhase, PhaseResult, u64)>, WorkerMessage) {
        let mut stats = Vec::new();
        loop {
            match self.next_sent().await {
                WorkerMessage::BuildPhaseStats { build_phase, result, duration_ms } => {
                    stats.push((build_phase, result, duration_ms))
                }
                msg if msg.is_terminal() => return (stats, msg),
                other => panic!("unexpected message {other:?}"),
            }
        }
    }

    pub fn nothing_sent(&mut self) -> bool {
        self.ops.try_recv().is_err()
    }
}

fn phases(stats: &[(BuildPhase, PhaseResult, u64)]) -> Vec<(BuildPhase, PhaseResult)> {
    stats.iter().map(|(phase, result, _)| (*phase, *result)).collect()
}

#[tokio::test]
async fn first_dispatch_builds_and_reports_success() {
    let mut fx = Fixture::new();
    let apk = fx.file("app/build/app-release.apk", "apk");
    fx.runner.succeed_with(BuildOutputs::new().with(ArtifactKind::ApplicationArchive, [apk]));

    fx.dispatch(android_job()).await;
    let (stats, terminal) = fx.until_terminal().await;

    assert_eq!(
        phases(&stats),
        vec![
            (BuildPhase::RestoreCache, PhaseResult::Skipped),
            (BuildPhase::Build, PhaseResult::Success),
            (BuildPhase::SaveCache, PhaseResult::Skipped),
            (BuildPhase::UploadApplicationArchive, PhaseResult::Success),
        ]
    );
    assert_eq!(
        terminal,
        WorkerMessage::Success {
            application_archive_name: Some("bucket/app-release.apk".to_string()),
            build_artifacts_name: None,
        }
    );
    assert_eq!(fx.orchestrator.status(), WorkerStatus::Success);
    assert!(fx.alerts.alerts().is_empty());
}

#[tokio::test]
async fn later_dispatches_are_ignored() {
    let mut fx = Fixture::new();
    fx.runner.hold();

    fx.dispatch(android_job()).await;
    fx.dispatch(ios_job()).await;
    fx.runner.wait_started().await;
    fx.runner.release();
    fx.until_terminal().await;

    let builds = fx.runner.builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].job, android_job());
}

#[tokio::test]
async fn dispatch_context_reaches_the_runner() {
    let mut fx = Fixture::new();
    let metadata = serde_json::json!({"projectId": "p-1", "buildProfile": "production"});

    fx.dispatch_request(BuildRequest::new(android_job()).with_initiating_user("user-9").with_metadata(metadata.clone()))
        .await;
    fx.until_terminal().await;

    let builds = fx.runner.builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].metadata, metadata);
    assert_eq!(builds[0].initiating_user_id.as_deref(), Some("user-9"));
}

#[tokio::test]
async fn mismatched_dispatch_never_starts_a_build() {
    let mut fx = Fixture::new();

    let reply = fx
        .deliver(LauncherMessage::Dispatch {
            build_id: BuildId::new("someone-else"),
            job: android_job(),
            initiating_user_id: None,
            metadata: serde_json::Value::Null,
        })
        .await;
    tokio::task::yield_now().await;

    assert_eq!(reply, None);
    assert_eq!(fx.orchestrator.status(), WorkerStatus::New);
    assert!(fx.runner.builds().is_empty());
    assert!(fx.nothing_sent());
    assert_eq!(
        fx.alerts.alerts(),
        vec![Alert::BuildIdMismatch {
            expected: BUILD_ID.to_string(),
            received: "someone-else".to_string(),
            context: "dispatch",
        }]
    );

    // The real dispatch still works afterwards
    fx.dispatch(android_job()).await;
    fx.until_terminal().await;
    assert_eq!(fx.runner.builds().len(), 1);
}

#[tokio::test]
async fn cancel_runs_hook_then_reports_aborted() {
    let mut fx = Fixture::new();
    fx.runner.hold();
    fx.dispatch(android_job()).await;
    fx.runner.wait_started().await;

    let reply = fx.deliver(LauncherMessage::Abort { reason: AbortReason::Cancel }).await;
    let (stats, terminal) = fx.until_terminal().await;

    assert_eq!(reply, None);
    assert_eq!(terminal, WorkerMessage::Aborted { reason: AbortReason::Cancel });
    assert_eq!(
        phases(&stats),
        vec![
            (BuildPhase::RestoreCache, PhaseResult::Skipped),
            (BuildPhase::OnBuildCancelHook, PhaseResult::Success),
        ]
    );
    assert_eq!(fx.runner.cancel_hook_calls(), 1);

    let snapshot = fx.orchestrator.snapshot();
    assert_eq!(snapshot.status, WorkerStatus::Aborted);
    assert_eq!(snapshot.abort_reason, Some(AbortReason::Cancel));

    // The build finishing later changes nothing
    fx.runner.release();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(fx.nothing_sent());
    assert_eq!(fx.orchestrator.status(), WorkerStatus::Aborted);
}

#[yare::parameterized(
    timeout_on_standard_job = { AbortReason::Timeout, android_job() },
    cancel_on_custom_job    = { AbortReason::Cancel, custom_job() },
)]
#[test_macro(tokio::test)]
async fn abort_without_cancel_hook(reason: AbortReason, job: Job) {
    let mut fx = Fixture::new();
    fx.runner.hold();
    fx.dispatch(job).await;
    fx.runner.wait_started().await;

    fx.deliver(LauncherMessage::Abort { reason }).await;
    let (stats, terminal) = fx.until_terminal().await;

    assert_eq!(terminal, WorkerMessage::Aborted { reason });
    assert!(stats.iter().all(|(phase, _, _)| *phase != BuildPhase::OnBuildCancelHook));
    assert_eq!(fx.runner.cancel_hook_calls(), 0);
    assert_eq!(fx.orchestrator.snapshot().abort_reason, Some(reason));
}

#[tokio::test]
async fn failing_cancel_hook_is_swallowed() {
    let mut fx = Fixture::new();
    fx.runner.hold();
    fx.runner.fail_cancel_hook();
    fx.dispatch(android_job()).await;
    fx.runner.wait_started().await;

    fx.deliver(LauncherMessage::Abort { reason: AbortReason::Cancel }).await;
    let (stats, terminal) = fx.until_terminal().await;

    assert_eq!(terminal, WorkerMessage::Aborted { reason: AbortReason::Cancel });
    assert!(stats.contains(&(BuildPhase::OnBuildCancelHook, PhaseResult::Fail, 0)));
    fx.runner.release();
}

#[tokio::test]
async fn abort_before_dispatch_is_a_no_op() {
    let mut fx = Fixture::new();

    fx.deliver(LauncherMessage::Abort { reason: AbortReason::Cancel }).await;
    tokio::task::yield_now().await;

    assert_eq!(fx.orchestrator.status(), WorkerStatus::New);
    assert_eq!(fx.orchestrator.snapshot().abort_reason, None);
    assert!(fx.nothing_sent());
}

#[tokio::test]
async fn abort_after_outcome_is_a_no_op() {
    let mut fx = Fixture::new();
    fx.dispatch(android_job()).await;
    fx.until_terminal().await;

    fx.deliver(LauncherMessage::Abort { reason: AbortReason::Timeout }).await;
    tokio::task::yield_now().await;

    let snapshot = fx.orchestrator.snapshot();
    assert_eq!(snapshot.status, WorkerStatus::Success);
    assert_eq!(snapshot.abort_reason, None);
    assert_eq!(fx.runner.cancel_hook_calls(), 0);
    assert!(fx.nothing_sent());
}

#[tokio::test]
async fn state_query_is_answered_in_every_phase() {
    let mut fx = Fixture::new();
    let apk = fx.file("app.apk", "apk");
    fx.runner.succeed_with(BuildOutputs::new().with(ArtifactKind::ApplicationArchive, [apk]));

    assert_eq!(fx.query().await, LifecycleState::new().snapshot());

    fx.runner.hold();
    fx.dispatch(android_job()).await;
    fx.runner.wait_started().await;
    assert_eq!(fx.query().await.status, WorkerStatus::InProgress);

    fx.runner.release();
    fx.until_terminal().await;
    let snapshot = fx.query().await;
    assert_eq!(snapshot.status, WorkerStatus::Success);
    assert_eq!(snapshot.application_archive_name.as_deref(), Some("bucket/app.apk"));
    assert_eq!(snapshot.external_build_error, None);
}

#[tokio::test]
async fn state_query_for_another_build_raises_alert() {
    let fx = Fixture::new();

    let reply = fx.deliver(LauncherMessage::StateQuery { build_id: BuildId::new("b-other") }).await;

    assert_eq!(reply, None);
    assert!(matches!(
        fx.alerts.alerts().as_slice(),
        [Alert::BuildIdMismatch { context: "state-query", .. }]
    ));
}

#[tokio::test]
async fn outcome_without_connection_is_recoverable_by_state_query() {
    let fx = Fixture::detached();
    let apk = fx.file("app.apk", "apk");
    fx.runner.succeed_with(BuildOutputs::new().with(ArtifactKind::ApplicationArchive, [apk]));

    fx.dispatch(android_job()).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while !fx.orchestrator.status().is_terminal() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let snapshot = fx.query().await;
    assert_eq!(snapshot.status, WorkerStatus::Success);
    assert_eq!(snapshot.application_archive_name.as_deref(), Some("bucket/app.apk"));
}

#[tokio::test]
async fn close_allows_exit_once_connection_is_gone() {
    let fx = Fixture::new();

    assert_eq!(fx.deliver(LauncherMessage::Close).await, None);

    assert!(fx.orchestrator.may_exit());
    assert!(fx.conn.is_closing());

    let orchestrator = Arc::clone(&fx.orchestrator);
    let waiter = tokio::spawn(async move { orchestrator.wait_for_exit().await });
    tokio::task::yield_now().await;
    assert!(!waiter.is_finished());

    fx.orchestrator.detach(fx.conn.id());
    tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap();
}

#[tokio::test]
async fn detach_ignores_stale_connection_ids() {
    let fx = Fixture::new();

    fx.orchestrator.detach(fx.conn.id() + 1000);
    assert!(fx.orchestrator.is_connected());

    fx.orchestrator.detach(fx.conn.id());
    assert!(!fx.orchestrator.is_connected());
}

#[tokio::test]
async fn connection_errors_raise_alert() {
    let fx = Fixture::new();

    fx.orchestrator.on_error(&fx.conn, &ConnectionError::Protocol(ProtocolError::Binary(3))).await;

    assert_eq!(
        fx.alerts.alerts(),
        vec![Alert::ConnectionFailed { error: "unexpected binary frame (3 bytes)".to_string() }]
    );
}

#[tokio::test(start_paused = true)]
async fn unclosed_worker_raises_hanging_alert() {
    let mut fx = Fixture::new();
    fx.runner.hold();
    fx.dispatch(android_job()).await;
    fx.runner.wait_started().await;
    fx.clock.advance(Duration::from_secs(42));
    fx.runner.release();
    fx.until_terminal().await;

    tokio::time::sleep(Duration::from_secs(299)).await;
    assert!(fx.alerts.alerts().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        fx.alerts.alerts(),
        vec![Alert::HangingWorker(HangingWorker {
            status: WorkerStatus::Success,
            connected: true,
            since_build_start: Some(Duration::from_secs(42)),
        })]
    );
    assert_eq!(fx.orchestrator.status(), WorkerStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn close_disarms_hanging_alert() {
    let mut fx = Fixture::new();
    fx.dispatch(android_job()).await;
    fx.until_terminal().await;

    fx.deliver(LauncherMessage::Close).await;
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert!(fx.alerts.alerts().is_empty());
}
