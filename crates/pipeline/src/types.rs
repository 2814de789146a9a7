//! Shared value types for the autodeploy domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types describe
//! whole domain records: the classified webhook event, one supervised process as
//! seen in a single inventory snapshot, and the per-process outcome of an update.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CommitSha, DeliveryId, GitRef, ProcessId, RepositoryUrl};

// ---------------------------------------------------------------------------
// Webhook events
// ---------------------------------------------------------------------------

/// A classified webhook event. Scoped to one delivery and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WebhookEvent {
    /// Connectivity test sent when the webhook is created. Only logged.
    Ping(PingEvent),
    /// Commits were pushed to a ref of the repository.
    Push(PushEvent),
}

/// Payload of a [`WebhookEvent::Ping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingEvent {
    /// `owner/name` of the repository, when the sender included it.
    pub repository_name: Option<String>,
    /// The sender's "zen" message.
    pub zen_message: String,
}

/// Payload of a [`WebhookEvent::Push`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Every equivalent remote URL form of the pushed repository.
    ///
    /// A process whose tracked URL is any member of this set tracks the
    /// repository.
    pub repository_urls: BTreeSet<RepositoryUrl>,
    /// `owner/name` of the repository, used for logging and on-disk inspection.
    pub repository_name: Option<String>,
    /// The pushed ref (e.g. `refs/heads/main`).
    pub ref_name: GitRef,
    /// Commit the ref points to after the push.
    pub head_commit: CommitSha,
    /// Commit the ref pointed to before the push.
    pub before_commit: CommitSha,
}

impl PushEvent {
    /// Returns `true` if `url` is one of the repository's URL forms.
    pub fn accepts_url(&self, url: &RepositoryUrl) -> bool {
        self.repository_urls.contains(url)
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// One supervised process as reported by the process supervisor.
///
/// This is a snapshot taken once per delivery. The versioning fields are kept
/// exactly as the supervisor reported them; validating them is the matcher's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedProcess {
    /// Supervisor-assigned identifier.
    pub id: ProcessId,
    /// Display name, used for logging only.
    pub name: Option<String>,
    /// Directory the process runs from; the deployed source lives here.
    pub working_directory: PathBuf,
    /// Origin URL recorded by the supervisor's versioning metadata.
    pub tracked_repository_url: Option<String>,
    /// Commit recorded by the supervisor as currently deployed.
    pub tracked_revision: Option<String>,
}

impl ManagedProcess {
    /// Creates a process entry without versioning metadata.
    pub fn new(id: ProcessId, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            id,
            name: None,
            working_directory: working_directory.into(),
            tracked_repository_url: None,
            tracked_revision: None,
        }
    }

    /// Returns `true` if the supervisor recorded any versioning metadata.
    pub fn has_versioning(&self) -> bool {
        self.tracked_repository_url.is_some() || self.tracked_revision.is_some()
    }
}

/// A process selected for update, with the working directory captured at
/// matching time. The orchestrator never re-resolves the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub process_id: ProcessId,
    pub working_directory: PathBuf,
}

impl From<&ManagedProcess> for MatchCandidate {
    fn from(process: &ManagedProcess) -> Self {
        Self {
            process_id: process.id.clone(),
            working_directory: process.working_directory.clone(),
        }
    }
}

/// State of a working directory's git checkout, as read from disk.
///
/// Only used by the legacy on-disk matching path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteState {
    /// URL of the `origin` remote.
    pub origin_url: Option<String>,
    /// Ref currently checked out (e.g. `refs/heads/main`); `None` when detached.
    pub branch_ref: Option<String>,
    /// Commit `HEAD` resolves to.
    pub head: Option<String>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Captured output of a successfully completed external command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// One stage of the per-process update pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStage {
    /// Reading the manifest before or after the pull.
    Manifest,
    /// `git pull` in the working directory.
    Pull,
    /// Dependency installation after a manifest change.
    Install,
    /// The manifest's build script.
    Build,
    /// Supervisor reload.
    Reload,
}

impl std::fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Manifest => "manifest",
            Self::Pull => "pull",
            Self::Install => "install",
            Self::Build => "build",
            Self::Reload => "reload",
        };
        f.write_str(s)
    }
}

/// Result of running the update pipeline for one process.
///
/// Only logged; never persisted or returned to the webhook sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub process_id: ProcessId,
    pub succeeded: bool,
    /// Stage that failed, when `succeeded` is `false`.
    pub failed_stage: Option<UpdateStage>,
    /// Human-readable error, when `succeeded` is `false`.
    pub failure_reason: Option<String>,
}

impl UpdateOutcome {
    /// Outcome of a process that was pulled, rebuilt as needed, and reloaded.
    pub fn success(process_id: ProcessId) -> Self {
        Self {
            process_id,
            succeeded: true,
            failed_stage: None,
            failure_reason: None,
        }
    }

    /// Outcome of a process whose pipeline stopped at `stage`.
    pub fn failure(process_id: ProcessId, stage: UpdateStage, reason: impl Into<String>) -> Self {
        Self {
            process_id,
            succeeded: false,
            failed_stage: Some(stage),
            failure_reason: Some(reason.into()),
        }
    }
}

/// Summary of one push delivery, logged once the orchestration loop finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub delivery_id: DeliveryId,
    pub started_at: Timestamp,
    /// Number of processes in the inventory snapshot.
    pub inventory_size: usize,
    /// One entry per matched process, in processing order.
    pub outcomes: Vec<UpdateOutcome>,
}

impl DeliveryReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
