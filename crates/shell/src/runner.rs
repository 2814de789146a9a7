//! [`CommandRunner`] that runs command lines through `sh -c`.
//!
//! Commands come from the operator (`git pull`) or from the manifest's
//! reserved scripts, which are full shell command lines, so they go through the
//! shell rather than being split into argv here.
//!
//! On unix each command runs in its own process group. If the future is dropped
//! before the command finishes (a stage timeout), the whole group is killed, so
//! children the shell started do not outlive the stage.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use pipeline::{CommandError, CommandOutput, CommandRunner};
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
}

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    /// Uses `shell` (invoked as `<shell> -c <command>`) instead of `sh`.
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(
        &self,
        command: &str,
        working_directory: &Path,
    ) -> Result<CommandOutput, CommandError> {
        debug!(command, cwd = %working_directory.display(), "Running command");

        let spawn_error = |source: std::io::Error| CommandError::Spawn {
            command: command.to_string(),
            working_directory: working_directory.to_path_buf(),
            source,
        };

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(spawn_error)?;
        let group = GroupKillGuard::new(child.id());
        let output = child.wait_with_output().await.map_err(spawn_error)?;
        group.disarm();

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(CommandError::NonZeroExit {
                command: command.to_string(),
                code: output.status.code(),
                stdout,
                stderr,
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }
}

/// Kills the child's process group on drop unless disarmed.
struct GroupKillGuard {
    pgid: Option<u32>,
}

impl GroupKillGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKillGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let Ok(raw) = i32::try_from(pgid) else {
                return;
            };
            match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
                Ok(()) => debug!(pgid, "Killed abandoned command process group"),
                Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => warn!(pgid, error = %e, "Cannot kill command process group"),
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_and_stderr_separately() {
        let dir = tempfile::tempdir().unwrap();
        let output = ShellCommandRunner::new()
            .run("echo out; echo err >&2", dir.path())
            .await
            .unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let output = ShellCommandRunner::new()
            .run("cat marker.txt", dir.path())
            .await
            .unwrap();
        assert_eq!(output.stdout, "here");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ShellCommandRunner::new()
            .run("echo partial; echo boom >&2; exit 3", dir.path())
            .await
            .unwrap_err();
        match err {
            CommandError::NonZeroExit {
                code,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(code, Some(3));
                assert_eq!(stdout, "partial\n");
                assert_eq!(stderr, "boom\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_dropped_command_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ShellCommandRunner::new();

        // The subshell outlives `sh` unless the whole group is killed.
        let run = runner.run("(sleep 1; touch finished) & wait", dir.path());
        let timed_out = tokio::time::timeout(Duration::from_millis(200), run).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("finished").exists());
    }

    #[tokio::test]
    async fn test_completed_command_leaves_background_children_alone() {
        let dir = tempfile::tempdir().unwrap();
        ShellCommandRunner::new()
            .run("(sleep 0.2; touch finished) >/dev/null 2>&1 &", dir.path())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(dir.path().join("finished").exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_spawn_error() {
        let err = ShellCommandRunner::new()
            .run("true", Path::new("/nonexistent/autodeploy-test"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
