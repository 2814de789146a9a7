//! In-memory implementations of the port traits for tests.
//!
//! Every fake writes to a shared [`CallLog`] so tests can assert the exact
//! sequence of side effects across supervisor and command calls.
//!
//! Available to this crate's unit tests and, through the `test-support`
//! feature, to downstream crates' tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    CommandError, CommandOutput, CommandRunner, ManagedProcess, ManifestError, ManifestSource,
    ProcessId, ProcessSupervisor, SupervisorError,
};

/// Ordered record of side effects.
#[derive(Debug, Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

// ---------------------------------------------------------------------------

/// Supervisor returning a fixed inventory.
///
/// Records `connect`, `list` and `reload <id>`.
pub struct FakeSupervisor {
    log: Arc<CallLog>,
    processes: Vec<ManagedProcess>,
    fail_connect: bool,
    fail_list: bool,
    failing_reloads: HashSet<String>,
    reloaded: Mutex<Vec<String>>,
}

impl FakeSupervisor {
    pub fn new(log: Arc<CallLog>, processes: Vec<ManagedProcess>) -> Self {
        Self {
            log,
            processes,
            fail_connect: false,
            fail_list: false,
            failing_reloads: HashSet::new(),
            reloaded: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn fail_listing(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn fail_reload_of(mut self, id: &str) -> Self {
        self.failing_reloads.insert(id.to_string());
        self
    }

    /// Ids of successfully reloaded processes, in order.
    pub fn reloaded(&self) -> Vec<String> {
        self.reloaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessSupervisor for FakeSupervisor {
    async fn connect(&self) -> Result<(), SupervisorError> {
        self.log.record("connect");
        if self.fail_connect {
            return Err(SupervisorError::Connect {
                message: "daemon not running".to_string(),
            });
        }
        Ok(())
    }

    async fn list_processes(&self) -> Result<Vec<ManagedProcess>, SupervisorError> {
        self.log.record("list");
        if self.fail_list {
            return Err(SupervisorError::Call {
                operation: "list".to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(self.processes.clone())
    }

    async fn reload(&self, id: &ProcessId) -> Result<(), SupervisorError> {
        self.log.record(format!("reload {id}"));
        if self.failing_reloads.contains(id.as_str()) {
            return Err(SupervisorError::Call {
                operation: format!("reload {id}"),
                message: "process not found".to_string(),
            });
        }
        self.reloaded.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------

/// Manifest contents keyed by working directory.
#[derive(Debug, Default)]
pub struct FakeManifests {
    files: Mutex<HashMap<PathBuf, String>>,
    unreadable: Mutex<HashSet<PathBuf>>,
}

impl FakeManifests {
    /// Sets (or with `None`, removes) the manifest of `dir`.
    pub fn set(&self, dir: impl Into<PathBuf>, content: Option<&str>) {
        let mut files = self.files.lock().unwrap();
        let dir = dir.into();
        match content {
            Some(c) => {
                files.insert(dir, c.to_string());
            }
            None => {
                files.remove(&dir);
            }
        }
    }

    /// Makes every later read of `dir` fail with a permission error.
    pub fn make_unreadable(&self, dir: impl Into<PathBuf>) {
        self.unreadable.lock().unwrap().insert(dir.into());
    }
}

#[async_trait]
impl ManifestSource for FakeManifests {
    async fn read(&self, working_directory: &Path) -> Result<Option<String>, ManifestError> {
        if self.unreadable.lock().unwrap().contains(working_directory) {
            return Err(ManifestError::Read {
                path: working_directory.join("package.json"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
            });
        }
        Ok(self.files.lock().unwrap().get(working_directory).cloned())
    }
}

// ---------------------------------------------------------------------------

type CommandKey = (PathBuf, String);

/// Command runner that succeeds unless told otherwise.
///
/// Records `run <dir>: <command>`. A `git pull` can be made to rewrite the
/// directory's manifest to simulate upstream changes.
pub struct FakeCommandRunner {
    log: Arc<CallLog>,
    manifests: Arc<FakeManifests>,
    pull_writes: HashMap<PathBuf, String>,
    pull_breaks: HashSet<PathBuf>,
    failures: HashMap<CommandKey, i32>,
    stderr: HashMap<CommandKey, String>,
    hangs: HashSet<CommandKey>,
}

impl FakeCommandRunner {
    pub fn new(log: Arc<CallLog>, manifests: Arc<FakeManifests>) -> Self {
        Self {
            log,
            manifests,
            pull_writes: HashMap::new(),
            pull_breaks: HashSet::new(),
            failures: HashMap::new(),
            stderr: HashMap::new(),
            hangs: HashSet::new(),
        }
    }

    pub fn on_pull_write_manifest(mut self, dir: impl Into<PathBuf>, content: &str) -> Self {
        self.pull_writes.insert(dir.into(), content.to_string());
        self
    }

    /// Makes the directory's manifest unreadable once `git pull` has run.
    pub fn on_pull_make_manifest_unreadable(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pull_breaks.insert(dir.into());
        self
    }

    pub fn fail(mut self, dir: impl Into<PathBuf>, command: &str, code: i32) -> Self {
        self.failures.insert((dir.into(), command.to_string()), code);
        self
    }

    pub fn with_stderr(mut self, dir: impl Into<PathBuf>, command: &str, stderr: &str) -> Self {
        self.stderr
            .insert((dir.into(), command.to_string()), stderr.to_string());
        self
    }

    /// Makes `command` never complete.
    pub fn hang(mut self, dir: impl Into<PathBuf>, command: &str) -> Self {
        self.hangs.insert((dir.into(), command.to_string()));
        self
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(
        &self,
        command: &str,
        working_directory: &Path,
    ) -> Result<CommandOutput, CommandError> {
        self.log
            .record(format!("run {}: {command}", working_directory.display()));
        let key = (working_directory.to_path_buf(), command.to_string());

        if self.hangs.contains(&key) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(code) = self.failures.get(&key) {
            return Err(CommandError::NonZeroExit {
                command: command.to_string(),
                code: Some(*code),
                stdout: String::new(),
                stderr: format!("{command} failed"),
            });
        }
        if command == crate::orchestrator::PULL_COMMAND {
            if let Some(content) = self.pull_writes.get(working_directory) {
                self.manifests.set(working_directory, Some(content.as_str()));
            }
            if self.pull_breaks.contains(working_directory) {
                self.manifests.make_unreadable(working_directory);
            }
        }
        Ok(CommandOutput {
            stdout: "ok".to_string(),
            stderr: self.stderr.get(&key).cloned().unwrap_or_default(),
        })
    }
}
