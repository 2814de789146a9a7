//! Port traits implemented by infrastructure crates.
//!
//! The domain logic in this crate only talks to the outside world through these
//! traits. Each one is object-safe (via `async_trait`) so the composition root
//! can hand `Arc<dyn Trait>` instances to the orchestrator, and tests can swap
//! in in-memory fakes.

use std::path::Path;

use async_trait::async_trait;

use crate::{
    CommandError, CommandOutput, ManagedProcess, ManifestError, ProcessId, RemoteState,
    SupervisorError,
};

/// The external process supervisor (pm2 or an equivalent).
///
/// Zero/low-downtime restart semantics of [`ProcessSupervisor::reload`] are the
/// supervisor's responsibility.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// One-time handshake. Must succeed before any other call.
    async fn connect(&self) -> Result<(), SupervisorError>;

    /// Returns every managed process, in the supervisor's order.
    async fn list_processes(&self) -> Result<Vec<ManagedProcess>, SupervisorError>;

    /// Reloads one process in place.
    async fn reload(&self, id: &ProcessId) -> Result<(), SupervisorError>;
}

/// Runs a shell command line in a directory.
///
/// A non-zero exit is reported as [`CommandError::NonZeroExit`]; output written
/// to stderr by a successful command is returned, not treated as an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, working_directory: &Path)
        -> Result<CommandOutput, CommandError>;
}

/// Reads the dependency manifest of a working directory.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Returns the raw manifest text, or `None` if the directory has no manifest.
    async fn read(&self, working_directory: &Path) -> Result<Option<String>, ManifestError>;
}

/// Reads the git state of a working directory from disk.
///
/// Only used by the legacy matching path for processes the supervisor has no
/// versioning metadata for.
#[async_trait]
pub trait RemoteInspector: Send + Sync {
    async fn inspect(&self, working_directory: &Path) -> Result<RemoteState, CommandError>;
}
