//! autodeploy daemon entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Resolve configuration**: flags and environment layered over an
//!    optional TOML file (see [`config`]).
//! 2. **Wire observability**: `tracing-subscriber` with an optional
//!    OpenTelemetry OTLP layer (see [`telemetry`]).
//! 3. **Construct infrastructure**: the pm2 supervisor adapter, the shell
//!    command runner, the manifest reader and (when enabled) the git remote
//!    inspector, injected into the [`pipeline`] orchestrator.
//! 4. **Serve**: start the webhook listener immediately and open the
//!    readiness gate once the pm2 handshake succeeds. A failed handshake stops
//!    the daemon.

#![forbid(unsafe_code)]

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use github::WebhookSecret;
use listener::{connect_and_open, create_router, serve, ReadinessGate, WebhookState};
use pipeline::{DeliveryHandler, ProcessSupervisor, UpdateOrchestrator};
use shell::{FsManifestSource, GitRemoteInspector, ShellCommandRunner};
use supervisor::Pm2Supervisor;
use tokio::sync::oneshot;
use tracing::{info, warn};

use config::{Cli, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load(Cli::parse())?;
    let _telemetry = telemetry::init(settings.log_format, settings.otlp_endpoint.as_deref())?;

    info!(version = env!("CARGO_PKG_VERSION"), ?settings, "Starting autodeploy");

    let secret = WebhookSecret::new(&settings.secret).context("invalid webhook secret")?;

    let supervisor: Arc<dyn ProcessSupervisor> = Arc::new(Pm2Supervisor::new(&settings.pm2_bin));
    let runner = Arc::new(ShellCommandRunner::new());
    let orchestrator = UpdateOrchestrator::new(
        supervisor.clone(),
        runner.clone(),
        Arc::new(FsManifestSource),
    )
    .with_stage_timeout(settings.stage_timeout);

    let mut handler = DeliveryHandler::new(supervisor.clone(), orchestrator);
    if settings.legacy_remote_inspection {
        info!("Legacy remote inspection enabled for processes without versioning metadata");
        handler = handler.with_remote_inspection(Arc::new(GitRemoteInspector::new(runner)));
    }

    let gate = ReadinessGate::new();
    let router = create_router(WebhookState {
        secret,
        gate: gate.clone(),
        version: env!("CARGO_PKG_VERSION"),
    });

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let shutdown = async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl-C, shutting down");
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = stop_rx => {}
        }
    };
    let server = tokio::spawn(serve(settings.listen, router, shutdown));

    if let Err(e) = connect_and_open(&gate, supervisor, handler).await {
        let _ = stop_tx.send(());
        server.await??;
        return Err(e).context("cannot connect to pm2");
    }

    server.await?.context("webhook listener failed")?;
    drop(stop_tx);
    info!("autodeploy stopped");
    Ok(())
}
