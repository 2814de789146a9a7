//! autodeploy host adapters.
//!
//! Implements the host-facing port traits of the [`pipeline`] crate:
//!
//! - [`ShellCommandRunner`]: [`pipeline::CommandRunner`] via `sh -c`.
//! - [`FsManifestSource`]: [`pipeline::ManifestSource`] reading `package.json`.
//! - [`GitRemoteInspector`]: [`pipeline::RemoteInspector`] via `git`, for the
//!   legacy on-disk matching path.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Process spawning and file access live here.

pub mod git;
pub mod manifest;
pub mod runner;

pub use git::GitRemoteInspector;
pub use manifest::FsManifestSource;
pub use runner::ShellCommandRunner;
