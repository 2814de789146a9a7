//! Repository matching: which managed processes does a push concern?
//!
//! The primary strategy, [`match_candidates`], is a pure function over the push
//! event and the inventory snapshot. It relies on the versioning metadata the
//! supervisor recorded for each process.
//!
//! [`match_with_inspection`] adds the legacy fallback: for processes without
//! recorded metadata it reads the git state of the working directory from disk.
//! Recorded metadata always takes precedence when present.

use tracing::{debug, warn};

use crate::{
    CommitSha, ManagedProcess, MatchCandidate, MatchError, PushEvent, RemoteInspector,
    RemoteState, RepositoryUrl,
};

/// Why a process was or was not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchDecision {
    /// The process tracks the pushed repository and is behind.
    Matched,
    /// The supervisor recorded no repository URL for the process.
    NoTrackedUrl,
    /// The process tracks a different repository.
    DifferentRepository,
    /// The process already runs the pushed head commit.
    AlreadyDeployed,
}

/// Evaluates one process against a push using recorded metadata only.
pub fn evaluate(push: &PushEvent, process: &ManagedProcess) -> Result<MatchDecision, MatchError> {
    let Some(raw_url) = process.tracked_repository_url.as_deref() else {
        return Ok(MatchDecision::NoTrackedUrl);
    };
    let url = parse_tracked_url(process, raw_url)?;
    if !push.accepts_url(&url) {
        return Ok(MatchDecision::DifferentRepository);
    }

    if let Some(raw_revision) = process.tracked_revision.as_deref() {
        let revision = CommitSha::new(raw_revision.trim()).ok_or_else(|| {
            MatchError::MalformedRevision {
                process_id: process.id.clone(),
                revision: raw_revision.to_string(),
            }
        })?;
        if revision == push.head_commit {
            return Ok(MatchDecision::AlreadyDeployed);
        }
    }

    Ok(MatchDecision::Matched)
}

fn parse_tracked_url(process: &ManagedProcess, raw: &str) -> Result<RepositoryUrl, MatchError> {
    let malformed = || MatchError::MalformedUrl {
        process_id: process.id.clone(),
        url: raw.to_string(),
    };
    if raw.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    RepositoryUrl::new(raw).ok_or_else(malformed)
}

/// Selects the processes a push should update, in inventory order.
///
/// Each process is evaluated independently; a process with malformed metadata
/// is logged and skipped without affecting the others.
pub fn match_candidates(push: &PushEvent, inventory: &[ManagedProcess]) -> Vec<MatchCandidate> {
    inventory
        .iter()
        .filter(|process| decide(push, process) == Some(MatchDecision::Matched))
        .map(MatchCandidate::from)
        .collect()
}

fn decide(push: &PushEvent, process: &ManagedProcess) -> Option<MatchDecision> {
    match evaluate(push, process) {
        Ok(decision) => {
            debug!(process_id = %process.id, ?decision, "Evaluated process");
            Some(decision)
        }
        Err(e) => {
            warn!(process_id = %process.id, error = %e, "Treating process as non-matching");
            None
        }
    }
}

/// Like [`match_candidates`], but processes without a recorded repository URL
/// are matched by inspecting their working directory with `inspector`.
///
/// Inspections run one at a time in inventory order. A failed inspection is
/// logged and the process is treated as non-matching.
pub async fn match_with_inspection(
    push: &PushEvent,
    inventory: &[ManagedProcess],
    inspector: &dyn RemoteInspector,
) -> Vec<MatchCandidate> {
    let mut candidates = Vec::new();
    for process in inventory {
        match decide(push, process) {
            Some(MatchDecision::Matched) => candidates.push(MatchCandidate::from(process)),
            Some(MatchDecision::NoTrackedUrl) => {
                let state = match inspector.inspect(&process.working_directory).await {
                    Ok(state) => state,
                    Err(e) => {
                        let err = MatchError::Inspection {
                            process_id: process.id.clone(),
                            message: e.to_string(),
                        };
                        warn!(error = %err, "Treating process as non-matching");
                        continue;
                    }
                };
                if remote_state_matches(push, &state) {
                    debug!(process_id = %process.id, "Matched process by on-disk remote");
                    candidates.push(MatchCandidate::from(process));
                }
            }
            _ => {}
        }
    }
    candidates
}

/// Legacy on-disk matching rule.
///
/// The origin remote must point at the pushed repository (same host and
/// `owner/name`, in any URL form), the pushed ref must be the checked-out
/// branch, and `HEAD` must not already be the pushed head commit.
pub fn remote_state_matches(push: &PushEvent, state: &RemoteState) -> bool {
    let Some(origin) = state.origin_url.as_deref().and_then(repository_slug) else {
        return false;
    };
    let same_repository = push
        .repository_urls
        .iter()
        .filter_map(|url| repository_slug(url.as_str()))
        .any(|slug| slug == origin);
    if !same_repository {
        return false;
    }

    if state.branch_ref.as_deref() != Some(push.ref_name.as_str()) {
        return false;
    }

    match state.head.as_deref() {
        Some(head) => head != push.head_commit.as_str(),
        None => false,
    }
}

/// Reduces a remote URL to `(host, owner/name)`.
///
/// Understands `scheme://[user@]host[:port]/owner/name[.git]` and the scp-like
/// `user@host:owner/name[.git]` form. Host comparison is case-insensitive.
pub fn repository_slug(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let (host_part, path) = if let Some((_, rest)) = url.split_once("://") {
        let (authority, path) = rest.split_once('/')?;
        let host = authority.rsplit('@').next()?;
        let host = host.split(':').next()?;
        (host, path)
    } else {
        let (authority, path) = url.split_once(':')?;
        let host = authority.rsplit('@').next()?;
        (host, path)
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if host_part.is_empty() || path.is_empty() {
        return None;
    }
    Some((host_part.to_ascii_lowercase(), path.to_string()))
}
