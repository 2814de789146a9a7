//! Error types for the autodeploy domain.
//!
//! Port errors ([`SupervisorError`], [`CommandError`], [`ManifestError`]) are
//! produced by infrastructure adapters. [`UpdateError`] wraps them with the
//! pipeline stage that failed, and is always contained to one process.
//! [`DeliveryError`] is the only error that ends a whole delivery.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::{ProcessId, UpdateStage};

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`crate::ProcessSupervisor`] implementation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The initial handshake with the supervisor failed.
    #[error("Could not connect to the process supervisor: {message}")]
    Connect { message: String },

    /// An operation was attempted before the handshake succeeded.
    #[error("Process supervisor is not connected")]
    NotConnected,

    /// A supervisor call returned an error.
    #[error("Supervisor call '{operation}' failed: {message}")]
    Call { operation: String, message: String },

    /// The supervisor answered with output that could not be decoded.
    #[error("Could not decode supervisor response for '{operation}': {message}")]
    Decode { operation: String, message: String },
}

/// Failures reported by a [`crate::CommandRunner`] implementation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not be started at all.
    #[error("Failed to spawn '{command}' in {}: {source}", working_directory.display())]
    Spawn {
        command: String,
        working_directory: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    ///
    /// `code` is `None` when the process was terminated by a signal.
    #[error("'{command}' exited with {}: {}", exit_code_label(*code), stderr.trim())]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

fn exit_code_label(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

/// Failures reading or interpreting a project manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest exists but could not be read.
    #[error("Failed to read manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid JSON.
    #[error("Manifest is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// A failure of one process's update pipeline.
///
/// Never propagates past the orchestrator: it is logged and recorded in that
/// process's [`crate::UpdateOutcome`], and the next candidate proceeds.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("{stage} failed: {source}")]
    Command {
        stage: UpdateStage,
        #[source]
        source: CommandError,
    },

    #[error("Reload failed: {0}")]
    Reload(#[source] SupervisorError),

    /// A stage exceeded the configured per-stage timeout.
    #[error("{stage} timed out after {after:?}")]
    TimedOut { stage: UpdateStage, after: Duration },
}

impl UpdateError {
    /// The pipeline stage at which the failure happened.
    pub fn stage(&self) -> UpdateStage {
        match self {
            Self::Manifest(_) => UpdateStage::Manifest,
            Self::Command { stage, .. } | Self::TimedOut { stage, .. } => *stage,
            Self::Reload(_) => UpdateStage::Reload,
        }
    }
}

/// Errors that abort an entire delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The process inventory could not be fetched. No partial inventory is used.
    #[error("Process inventory unavailable: {0}")]
    InventoryUnavailable(#[source] SupervisorError),

    /// The orchestration task ended abnormally (e.g. panicked).
    #[error("Delivery {delivery} aborted unexpectedly: {message}")]
    Aborted { delivery: String, message: String },
}

/// Errors raised while evaluating one process during matching.
///
/// Always contained to that process: it is logged and the process is treated
/// as non-matching.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Process {process_id} has a malformed repository URL '{url}'")]
    MalformedUrl { process_id: ProcessId, url: String },

    #[error("Process {process_id} has a malformed revision '{revision}'")]
    MalformedRevision { process_id: ProcessId, revision: String },

    #[error("Could not inspect working directory of process {process_id}: {message}")]
    Inspection { process_id: ProcessId, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_error_reports_stage() {
        let err = UpdateError::Command {
            stage: UpdateStage::Build,
            source: CommandError::NonZeroExit {
                command: "npm run build".to_string(),
                code: Some(2),
                stdout: String::new(),
                stderr: "tsc: error\n".to_string(),
            },
        };
        assert_eq!(err.stage(), UpdateStage::Build);
        assert_eq!(
            err.to_string(),
            "build failed: 'npm run build' exited with status 2: tsc: error"
        );
    }

    #[test]
    fn test_timeout_and_reload_stages() {
        let timeout = UpdateError::TimedOut {
            stage: UpdateStage::Pull,
            after: Duration::from_secs(30),
        };
        assert_eq!(timeout.stage(), UpdateStage::Pull);
        assert_eq!(timeout.to_string(), "pull timed out after 30s");

        let short = UpdateError::TimedOut {
            stage: UpdateStage::Install,
            after: Duration::from_millis(1500),
        };
        assert_eq!(short.to_string(), "install timed out after 1.5s");

        let reload = UpdateError::Reload(SupervisorError::NotConnected);
        assert_eq!(reload.stage(), UpdateStage::Reload);
    }

    #[test]
    fn test_signal_exit_label() {
        let err = CommandError::NonZeroExit {
            command: "git pull".to_string(),
            code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(err.to_string().contains("a signal"));
    }
}
