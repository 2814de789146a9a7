//! [`RemoteInspector`] reading a checkout's state with `git`.
//!
//! Used only by the legacy matching path, for processes the supervisor has no
//! versioning metadata for.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{CommandError, CommandRunner, RemoteInspector, RemoteState};

const ORIGIN_URL: &str = "git remote get-url origin";
const BRANCH_REF: &str = "git symbolic-ref -q HEAD";
const HEAD_COMMIT: &str = "git rev-parse HEAD";

/// Runs `git` through a [`CommandRunner`] in the working directory.
#[derive(Clone)]
pub struct GitRemoteInspector {
    runner: Arc<dyn CommandRunner>,
}

impl GitRemoteInspector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn line(&self, command: &str, dir: &Path) -> Result<String, CommandError> {
        let output = self.runner.run(command, dir).await?;
        Ok(output.stdout.trim().to_string())
    }
}

#[async_trait]
impl RemoteInspector for GitRemoteInspector {
    async fn inspect(&self, working_directory: &Path) -> Result<RemoteState, CommandError> {
        let origin = self.line(ORIGIN_URL, working_directory).await?;
        // Exits 1 on a detached HEAD, which just means "no branch".
        let branch = match self.line(BRANCH_REF, working_directory).await {
            Ok(b) => Some(b),
            Err(CommandError::NonZeroExit { code: Some(1), .. }) => None,
            Err(e) => return Err(e),
        };
        let head = self.line(HEAD_COMMIT, working_directory).await?;

        Ok(RemoteState {
            origin_url: Some(origin).filter(|s| !s.is_empty()),
            branch_ref: branch.filter(|s| !s.is_empty()),
            head: Some(head).filter(|s| !s.is_empty()),
        })
    }
}
