//! The per-process update pipeline.
//!
//! For each [`MatchCandidate`], in order and one at a time:
//!
//! 1. snapshot the manifest (best effort),
//! 2. `git pull` in the working directory,
//! 3. run the install command if the manifest text changed,
//! 4. run the build script if the manifest declares one,
//! 5. ask the supervisor to reload the process.
//!
//! A failure at any stage ends that candidate only. It is logged, recorded in
//! the candidate's [`UpdateOutcome`], and the loop moves on. There are no
//! retries and no rollback: a candidate that fails after the pull is left at the
//! new source revision.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, info_span, warn, Instrument};

use crate::manifest::{dependencies_changed, Manifest};
use crate::{
    CommandOutput, CommandRunner, ManifestSource, MatchCandidate, ProcessLocks,
    ProcessSupervisor, UpdateError, UpdateOutcome, UpdateStage,
};

/// Command used to fetch the latest source.
pub const PULL_COMMAND: &str = "git pull";

/// Drives the update pipeline over a batch of candidates.
#[derive(Clone)]
pub struct UpdateOrchestrator {
    supervisor: Arc<dyn ProcessSupervisor>,
    runner: Arc<dyn CommandRunner>,
    manifests: Arc<dyn ManifestSource>,
    locks: ProcessLocks,
    stage_timeout: Option<Duration>,
}

impl UpdateOrchestrator {
    pub fn new(
        supervisor: Arc<dyn ProcessSupervisor>,
        runner: Arc<dyn CommandRunner>,
        manifests: Arc<dyn ManifestSource>,
    ) -> Self {
        Self {
            supervisor,
            runner,
            manifests,
            locks: ProcessLocks::new(),
            stage_timeout: None,
        }
    }

    /// Bounds every command stage and the reload call. `None` disables the bound.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Updates every candidate sequentially, in the given order.
    ///
    /// Always returns one outcome per candidate; this never fails as a whole.
    pub async fn run(&self, candidates: &[MatchCandidate]) -> Vec<UpdateOutcome> {
        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let span = info_span!(
                "update",
                process_id = %candidate.process_id,
                working_directory = %candidate.working_directory.display(),
            );
            let outcome = async {
                info!("Updating process");
                match self.update(candidate).await {
                    Ok(()) => {
                        info!("Reloaded process");
                        UpdateOutcome::success(candidate.process_id.clone())
                    }
                    Err(e) => {
                        error!(stage = %e.stage(), error = %e, "Failed to pull and reload");
                        UpdateOutcome::failure(candidate.process_id.clone(), e.stage(), e.to_string())
                    }
                }
            }
            .instrument(span)
            .await;
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Runs the whole pipeline for one candidate while holding its process lock.
    pub async fn update(&self, candidate: &MatchCandidate) -> Result<(), UpdateError> {
        let _guard = self.locks.acquire(&candidate.process_id).await;
        let dir = candidate.working_directory.as_path();

        let before = self.snapshot_manifest(dir, "before pull").await;

        self.run_stage(UpdateStage::Pull, PULL_COMMAND, dir).await?;

        let after = self.snapshot_manifest(dir, "after pull").await;
        let changed = dependencies_changed(before.as_deref(), after.as_deref());

        // An unchanged manifest only matters for its build script.
        let manifest = match after.as_deref().map(Manifest::parse).transpose() {
            Ok(manifest) => manifest,
            Err(e) if changed => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Manifest is not valid JSON, skipping build script");
                None
            }
        };

        if changed {
            let install = manifest
                .as_ref()
                .map(Manifest::install_command)
                .unwrap_or(crate::manifest::DEFAULT_INSTALL_COMMAND);
            info!(command = install, "Manifest changed, installing dependencies");
            self.run_stage(UpdateStage::Install, install, dir).await?;
        }

        if let Some(build) = manifest.as_ref().and_then(Manifest::build_command) {
            info!(command = build, "Running build script");
            self.run_stage(UpdateStage::Build, build, dir).await?;
        }

        info!("Pulled successfully, reloading");
        self.bounded(UpdateStage::Reload, self.supervisor.reload(&candidate.process_id))
            .await?
            .map_err(UpdateError::Reload)
    }

    /// Reads the manifest, treating a read failure as an absent manifest.
    async fn snapshot_manifest(&self, dir: &Path, when: &str) -> Option<String> {
        match self.manifests.read(dir).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, when, "Could not read manifest; treating as absent");
                None
            }
        }
    }

    async fn run_stage(
        &self,
        stage: UpdateStage,
        command: &str,
        dir: &Path,
    ) -> Result<CommandOutput, UpdateError> {
        let output = self
            .bounded(stage, self.runner.run(command, dir))
            .await?
            .map_err(|source| UpdateError::Command { stage, source })?;

        let stdout = output.stdout.trim();
        if !stdout.is_empty() {
            info!(%stage, stdout, "Command output");
        }
        // Many tools report progress on stderr; it is not a failure on its own.
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            warn!(%stage, stderr, "Command wrote to stderr");
        }
        Ok(output)
    }

    async fn bounded<F: Future>(&self, stage: UpdateStage, fut: F) -> Result<F::Output, UpdateError> {
        match self.stage_timeout {
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| UpdateError::TimedOut { stage, after }),
            None => Ok(fut.await),
        }
    }
}
