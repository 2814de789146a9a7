//! Core domain for autodeploy.
//!
//! This crate decides which managed processes a repository push concerns and
//! drives each of them through the pull → install → build → reload pipeline.
//! Infrastructure crates implement the port traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no process,
//! network or file I/O of its own. It defines *what* is needed; infrastructure
//! crates (`supervisor`, `shell`) define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`ProcessId`, `CommitSha`, etc.) |
//! | [`types`] | Events, inventory records, outcomes |
//! | [`errors`] | Port, pipeline and delivery error types |
//! | [`ports`] | `ProcessSupervisor`, `CommandRunner`, `ManifestSource`, `RemoteInspector` |
//! | [`manifest`] | `package.json` script lookup and change detection |
//! | [`matcher`] | Push → candidate selection |
//! | [`orchestrator`] | Sequential per-process update pipeline |
//! | [`locks`] | Per-process serialization across deliveries |
//! | [`delivery`] | One delivery end to end |

pub mod delivery;
pub mod errors;
pub mod identifiers;
pub mod locks;
pub mod manifest;
pub mod matcher;
pub mod orchestrator;
pub mod ports;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

#[cfg(test)]
mod log_capture;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use delivery::DeliveryHandler;
pub use errors::{
    CommandError, DeliveryError, ManifestError, MatchError, SupervisorError, UpdateError,
};
pub use identifiers::{CommitSha, DeliveryId, GitRef, ProcessId, RepositoryUrl};
pub use locks::ProcessLocks;
pub use manifest::{Manifest, MANIFEST_FILE_NAME};
pub use matcher::{match_candidates, MatchDecision};
pub use orchestrator::UpdateOrchestrator;
pub use ports::{CommandRunner, ManifestSource, ProcessSupervisor, RemoteInspector};
pub use types::{
    CommandOutput, DeliveryReport, ManagedProcess, MatchCandidate, PingEvent, PushEvent,
    RemoteState, Timestamp, UpdateOutcome, UpdateStage, WebhookEvent,
};
