//! [`ProcessSupervisor`] over the `pm2` command-line interface.
//!
//! | Port operation | pm2 invocation |
//! |----------------|----------------|
//! | `connect` | `pm2 ping` (starts the pm2 daemon if needed) |
//! | `list_processes` | `pm2 jlist` |
//! | `reload` | `pm2 reload <id>` |

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use pipeline::{ManagedProcess, ProcessId, ProcessSupervisor, SupervisorError};
use tokio::process::Command;
use tracing::debug;

use crate::jlist::parse_process_list;

/// Drives a pm2 installation through its CLI.
#[derive(Debug)]
pub struct Pm2Supervisor {
    program: String,
    base_args: Vec<String>,
    connected: AtomicBool,
}

impl Pm2Supervisor {
    /// Uses `program` as the pm2 executable (usually just `"pm2"`).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            connected: AtomicBool::new(false),
        }
    }

    /// Arguments placed before every pm2 subcommand, e.g. `["pm2"]` when
    /// `program` is `npx`.
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn ensure_connected(&self) -> Result<(), SupervisorError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(SupervisorError::NotConnected)
        }
    }

    async fn pm2(&self, args: &[&str]) -> Result<String, SupervisorError> {
        let operation = args.join(" ");
        debug!(program = %self.program, %operation, "Calling pm2");

        let output = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SupervisorError::Call {
                operation: operation.clone(),
                message: format!("failed to run {}: {e}", self.program),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SupervisorError::Call {
                operation,
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for Pm2Supervisor {
    fn default() -> Self {
        Self::new("pm2")
    }
}

#[async_trait]
impl ProcessSupervisor for Pm2Supervisor {
    async fn connect(&self) -> Result<(), SupervisorError> {
        self.pm2(&["ping"])
            .await
            .map_err(|e| SupervisorError::Connect {
                message: e.to_string(),
            })?;
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn list_processes(&self) -> Result<Vec<ManagedProcess>, SupervisorError> {
        self.ensure_connected()?;
        let stdout = self.pm2(&["jlist"]).await?;
        parse_process_list(&stdout)
    }

    async fn reload(&self, id: &ProcessId) -> Result<(), SupervisorError> {
        self.ensure_connected()?;
        self.pm2(&["reload", id.as_str()]).await.map(drop)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;

    use super::*;

    /// A stand-in for pm2: a shell script run through `sh`, logging each
    /// invocation next to itself.
    struct FakePm2 {
        dir: tempfile::TempDir,
    }

    impl FakePm2 {
        fn new(body: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut script = std::fs::File::create(dir.path().join("pm2.sh")).unwrap();
            writeln!(script, "echo \"$@\" >> \"$(dirname \"$0\")/calls.log\"").unwrap();
            script.write_all(body.as_bytes()).unwrap();
            Self { dir }
        }

        fn supervisor(&self) -> Pm2Supervisor {
            Pm2Supervisor::new("sh")
                .with_base_args([self.dir.path().join("pm2.sh").display().to_string()])
        }

        fn calls(&self) -> Vec<String> {
            std::fs::read_to_string(self.dir.path().join("calls.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    const HAPPY: &str = r#"
case "$1" in
  ping) echo "[PM2] PM2 Successfully daemonized"; echo '{ msg: "pong" }' ;;
  jlist) echo '[{"name":"api","pm_id":0,"pm2_env":{"pm_cwd":"/srv/api","versioning":{"url":"git@github.com:acme/api.git","revision":"def456"}}}]' ;;
  reload) [ "$2" = "0" ] || { echo "[PM2][ERROR] Process $2 not found" >&2; exit 1; } ;;
esac
"#;

    #[tokio::test]
    async fn test_calls_before_connect_are_refused() {
        let pm2 = FakePm2::new(HAPPY);
        let supervisor = pm2.supervisor();

        assert!(matches!(
            supervisor.list_processes().await,
            Err(SupervisorError::NotConnected)
        ));
        assert!(pm2.calls().is_empty());
    }

    #[tokio::test]
    async fn test_connect_list_and_reload() {
        let pm2 = FakePm2::new(HAPPY);
        let supervisor = pm2.supervisor();

        supervisor.connect().await.unwrap();
        let processes = supervisor.list_processes().await.unwrap();
        supervisor.reload(&processes[0].id).await.unwrap();

        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].tracked_revision.as_deref(), Some("def456"));
        assert_eq!(pm2.calls(), ["ping", "jlist", "reload 0"]);
    }

    #[tokio::test]
    async fn test_reload_failure_carries_stderr() {
        let pm2 = FakePm2::new(HAPPY);
        let supervisor = pm2.supervisor();
        supervisor.connect().await.unwrap();

        let err = supervisor
            .reload(&ProcessId::new("9").unwrap())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Process 9 not found"));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let pm2 = FakePm2::new("exit 1\n");
        let supervisor = pm2.supervisor();

        assert!(matches!(
            supervisor.connect().await,
            Err(SupervisorError::Connect { .. })
        ));
        assert!(matches!(
            supervisor.list_processes().await,
            Err(SupervisorError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_connect_error() {
        let supervisor = Pm2Supervisor::new("/nonexistent/pm2");
        assert!(matches!(
            supervisor.connect().await,
            Err(SupervisorError::Connect { .. })
        ));
    }
}
