//! Decoding of `pm2 jlist` output.
//!
//! `pm2 jlist` prints the process table as one JSON array. Depending on the pm2
//! version it may print banner lines (e.g. an out-of-date daemon warning)
//! before it, so the array is located by scanning lines from the end.

use pipeline::{ManagedProcess, ProcessId, SupervisorError};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct Pm2Process {
    pm_id: Value,
    name: Option<String>,
    pm2_env: Option<Pm2Env>,
}

#[derive(Debug, Deserialize)]
struct Pm2Env {
    pm_cwd: Option<String>,
    versioning: Option<Pm2Versioning>,
}

#[derive(Debug, Deserialize)]
struct Pm2Versioning {
    url: Option<String>,
    revision: Option<String>,
}

/// Decodes the whole process table.
///
/// Fails only if no JSON array can be found. Individual entries that cannot be
/// decoded are logged and skipped.
pub fn parse_process_list(output: &str) -> Result<Vec<ManagedProcess>, SupervisorError> {
    let entries = output
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('['))
        .find_map(|line| serde_json::from_str::<Vec<Value>>(line).ok())
        .or_else(|| serde_json::from_str::<Vec<Value>>(output.trim()).ok())
        .ok_or_else(|| SupervisorError::Decode {
            operation: "jlist".to_string(),
            message: "no process list found in output".to_string(),
        })?;

    Ok(entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match parse_entry(entry) {
            Ok(process) => Some(process),
            Err(reason) => {
                warn!(index, %reason, "Skipping malformed pm2 process entry");
                None
            }
        })
        .collect())
}

fn parse_entry(entry: Value) -> Result<ManagedProcess, String> {
    let raw: Pm2Process = serde_json::from_value(entry).map_err(|e| e.to_string())?;

    let id = match &raw.pm_id {
        Value::Number(n) => ProcessId::new(n.to_string()),
        Value::String(s) => ProcessId::new(s.as_str()),
        _ => None,
    }
    .ok_or("missing pm_id")?;

    let env = raw.pm2_env.ok_or_else(|| format!("process {id} has no pm2_env"))?;
    let cwd = env
        .pm_cwd
        .filter(|c| !c.is_empty())
        .ok_or_else(|| format!("process {id} has no working directory"))?;
    let (url, revision) = match env.versioning {
        Some(v) => (v.url, v.revision),
        None => (None, None),
    };

    Ok(ManagedProcess {
        id,
        name: raw.name,
        working_directory: cwd.into(),
        tracked_repository_url: url,
        tracked_revision: revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const JLIST: &str = r#"[
        {"pid":101,"name":"api","pm_id":0,"pm2_env":{"pm_cwd":"/srv/api","status":"online","versioning":{"type":"git","url":"https://github.com/acme/api.git","revision":"def456","branch":"main","unstaged":false}}},
        {"pid":102,"name":"worker","pm_id":1,"pm2_env":{"pm_cwd":"/srv/worker","status":"online","versioning":null}},
        {"pid":103,"name":"broken","pm2_env":{"pm_cwd":"/srv/broken"}},
        {"pid":104,"name":"nocwd","pm_id":3,"pm2_env":{"status":"stopped"}},
        {"pid":105,"name":"cron","pm_id":4,"pm2_env":{"pm_cwd":"/srv/cron"}}
    ]"#;

    #[test]
    fn test_parses_entries_and_skips_malformed() {
        let processes = parse_process_list(JLIST).unwrap();
        let ids: Vec<&str> = processes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["0", "1", "4"]);

        let api = &processes[0];
        assert_eq!(api.name.as_deref(), Some("api"));
        assert_eq!(api.working_directory, std::path::PathBuf::from("/srv/api"));
        assert_eq!(
            api.tracked_repository_url.as_deref(),
            Some("https://github.com/acme/api.git")
        );
        assert_eq!(api.tracked_revision.as_deref(), Some("def456"));

        assert!(!processes[1].has_versioning());
        assert!(!processes[2].has_versioning());
    }

    #[test]
    fn test_skips_banner_lines() {
        let output = concat!(
            ">>>> In-memory PM2 is out-of-date, do:\n",
            ">>>> $ pm2 update\n",
            "[PM2] Spawning PM2 daemon\n",
            r#"[{"name":"api","pm_id":7,"pm2_env":{"pm_cwd":"/srv/api"}}]"#,
            "\n"
        );
        let processes = parse_process_list(output).unwrap();
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].id.as_str(), "7");
    }

    #[test]
    fn test_empty_list() {
        assert!(parse_process_list("[]\n").unwrap().is_empty());
    }

    #[test]
    fn test_non_json_output_is_an_error() {
        assert!(matches!(
            parse_process_list("[PM2] Daemon not running"),
            Err(SupervisorError::Decode { .. })
        ));
    }
}
