// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build runner: the platform-specific build collaborator.
//!
//! The worker never compiles anything itself. It hands the job to a runner
//! and gets back the local files the build produced.

use async_trait::async_trait;
use fh_core::{codes, BuildError, BuildFailure, BuildOutputs, BuildRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from invoking the runner executable
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("runner I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode build request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("runner exited with code {code}")]
    Exit { code: i32 },

    #[error("runner printed an unreadable report: {0}")]
    Report(#[source] serde_json::Error),
}

/// Failure details a runner reports alongside partial outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedError {
    pub error_code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_error_code: Option<String>,
}

/// JSON document a runner prints on stdout when it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerReport {
    #[serde(default)]
    pub outputs: BuildOutputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
}

impl RunnerReport {
    fn into_result(self) -> Result<BuildOutputs, BuildFailure> {
        match self.error {
            None => Ok(self.outputs),
            Some(reported) => {
                let mut error = BuildError::new(reported.error_code, reported.message);
                if let Some(code) = reported.internal_error_code {
                    error = error.with_internal_code(code);
                }
                Err(BuildFailure::new(error).with_outputs(self.outputs))
            }
        }
    }
}

/// Adapter for running the build and its cancellation hook
#[async_trait]
pub trait BuildRunner: Clone + Send + Sync + 'static {
    /// Run the build. On failure the returned outputs are whatever the build
    /// managed to produce before failing.
    async fn run_build(&self, request: &BuildRequest) -> Result<BuildOutputs, BuildFailure>;

    /// Best-effort cleanup after a user cancelled the build.
    async fn run_cancel_hook(&self, request: &BuildRequest) -> Result<(), RunnerError>;
}

/// Runs an external executable as `<program> build` or
/// `<program> cancel-hook`, with the build request
/// (`{job, initiatingUserId, metadata}`) as JSON on stdin.
///
/// `build` prints a [`RunnerReport`] on stdout. The child is not killed when
/// the worker stops waiting for it.
#[derive(Clone, Debug)]
pub struct CommandRunner {
    program: PathBuf,
    working_dir: PathBuf,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), working_dir: working_dir.into() }
    }

    async fn invoke(&self, subcommand: &str, request: &BuildRequest) -> Result<std::process::Output, RunnerError> {
        let input = serde_json::to_vec(request).map_err(RunnerError::Encode)?;

        tracing::info!(
            program = %self.program.display(),
            subcommand,
            cwd = %self.working_dir.display(),
            "starting runner"
        );

        let mut child = tokio::process::Command::new(&self.program)
            .arg(subcommand)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| RunnerError::Spawn { program: self.program.display().to_string(), source })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
            stdin.shutdown().await?;
        }

        Ok(child.wait_with_output().await?)
    }
}

#[async_trait]
impl BuildRunner for CommandRunner {
    async fn run_build(&self, request: &BuildRequest) -> Result<BuildOutputs, BuildFailure> {
        let output = self.invoke("build", request).await.map_err(runner_failure)?;
        let code = output.status.code().unwrap_or(-1);

        match serde_json::from_slice::<RunnerReport>(&output.stdout) {
            Ok(report) if output.status.success() || report.error.is_some() => report.into_result(),
            Ok(report) => Err(runner_failure(RunnerError::Exit { code }).with_outputs(report.outputs)),
            Err(_) if !output.status.success() => Err(runner_failure(RunnerError::Exit { code })),
            Err(e) => Err(runner_failure(RunnerError::Report(e))),
        }
    }

    async fn run_cancel_hook(&self, request: &BuildRequest) -> Result<(), RunnerError> {
        let output = self.invoke("cancel-hook", request).await?;
        if !output.status.success() {
            return Err(RunnerError::Exit { code: output.status.code().unwrap_or(-1) });
        }
        Ok(())
    }
}

fn runner_failure(err: RunnerError) -> BuildFailure {
    BuildFailure::new(BuildError::unknown(err).with_internal_code(codes::RUNNER_FAILED))
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{BuildRunner, RunnerError};
    use async_trait::async_trait;
    use fh_core::{BuildError, BuildFailure, BuildOutputs, BuildRequest};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::Notify;

    enum Outcome {
        Succeed(BuildOutputs),
        Fail { code: String, message: String, outputs: BuildOutputs },
    }

    struct FakeRunnerState {
        outcome: Outcome,
        held: bool,
        builds: Vec<BuildRequest>,
        cancel_hooks: usize,
        fail_cancel_hook: bool,
    }

    /// Fake build runner.
    ///
    /// Succeeds with empty outputs unless told otherwise. A held runner
    /// blocks in `run_build` until released.
    #[derive(Clone)]
    pub struct FakeBuildRunner {
        inner: Arc<Mutex<FakeRunnerState>>,
        release: Arc<Notify>,
        started: Arc<Notify>,
    }

    impl Default for FakeBuildRunner {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeRunnerState {
                    outcome: Outcome::Succeed(BuildOutputs::default()),
                    held: false,
                    builds: Vec::new(),
                    cancel_hooks: 0,
                    fail_cancel_hook: false,
                })),
                release: Arc::new(Notify::new()),
                started: Arc::new(Notify::new()),
            }
        }
    }

    impl FakeBuildRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn succeed_with(&self, outputs: BuildOutputs) {
            self.inner.lock().outcome = Outcome::Succeed(outputs);
        }

        /// Fail with the given code after producing `outputs`
        pub fn fail_with(&self, code: &str, message: &str, outputs: BuildOutputs) {
            self.inner.lock().outcome =
                Outcome::Fail { code: code.to_string(), message: message.to_string(), outputs };
        }

        /// Block `run_build` until [`release`](Self::release) is called
        pub fn hold(&self) {
            self.inner.lock().held = true;
        }

        pub fn release(&self) {
            self.inner.lock().held = false;
            self.release.notify_waiters();
        }

        /// Wait until `run_build` has been entered
        pub async fn wait_started(&self) {
            let started = self.started.notified();
            if !self.inner.lock().builds.is_empty() {
                return;
            }
            started.await;
        }

        pub fn fail_cancel_hook(&self) {
            self.inner.lock().fail_cancel_hook = true;
        }

        /// Requests `run_build` was called with, in order
        pub fn builds(&self) -> Vec<BuildRequest> {
            self.inner.lock().builds.clone()
        }

        pub fn cancel_hook_calls(&self) -> usize {
            self.inner.lock().cancel_hooks
        }
    }

    #[async_trait]
    impl BuildRunner for FakeBuildRunner {
        async fn run_build(&self, request: &BuildRequest) -> Result<BuildOutputs, BuildFailure> {
            let released = self.release.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let held = {
                let mut inner = self.inner.lock();
                inner.builds.push(request.clone());
                inner.held
            };
            self.started.notify_waiters();
            if held {
                released.await;
            }

            match &self.inner.lock().outcome {
                Outcome::Succeed(outputs) => Ok(outputs.clone()),
                Outcome::Fail { code, message, outputs } => {
                    Err(BuildFailure::new(BuildError::new(code.clone(), message.clone())).with_outputs(outputs.clone()))
                }
            }
        }

        async fn run_cancel_hook(&self, _request: &BuildRequest) -> Result<(), RunnerError> {
            let mut inner = self.inner.lock();
            inner.cancel_hooks += 1;
            if inner.fail_cancel_hook {
                return Err(RunnerError::Exit { code: 1 });
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBuildRunner;

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
