// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fhd: runs one build for the launcher that connects to it, then exits
//! once the launcher sends `close`.

use fh_adapters::{CommandRunner, HttpBuildApi, HttpTransport, LogAlertAdapter};
use fh_core::SystemClock;
use fh_daemon::{env, logging, ConnectionConfig, Listener, Orchestrator, WorkerDeps, WorkerSettings};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match env::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fhd: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = match logging::init(&config.log_filter, config.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("fhd: cannot open log file: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(build_id = %config.build_id, project_dir = %config.project_dir.display(), "starting worker");

    let listener = match Listener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.listen_addr, error = %e, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    let settings = WorkerSettings::from_config(&config);
    let staging_dir = settings.staging_dir.clone();
    let deps = WorkerDeps {
        api: HttpBuildApi::new(config.api_url.clone(), config.access_token.clone(), config.build_id.clone()),
        transport: HttpTransport::new(),
        runner: CommandRunner::new(config.runner.clone(), config.project_dir.clone()),
        alerts: LogAlertAdapter,
    };
    let orchestrator = Orchestrator::new(deps, settings, SystemClock);

    let connection = ConnectionConfig { ping_interval: config.ping_interval, ..ConnectionConfig::default() };
    listener.run(orchestrator, connection).await;

    if let Err(e) = tokio::fs::remove_dir_all(&staging_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!(path = %staging_dir.display(), error = %e, "failed to remove staging directory");
        }
    }
    info!("worker exiting");
    ExitCode::SUCCESS
}
