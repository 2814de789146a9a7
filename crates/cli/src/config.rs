//! Daemon configuration: command-line flags and environment variables layered
//! over an optional TOML file.
//!
//! Precedence, highest first: flag or environment variable, file, built-in
//! default. The webhook secret has no default; a configuration without one is
//! rejected at startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 9876;
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PM2_BIN: &str = "pm2";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "autodeploy")]
#[command(author, version, about = "Redeploys pm2-managed services on GitHub push webhooks")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "AUTODEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on for webhook deliveries
    #[arg(short, long, env = "AUTODEPLOY_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "AUTODEPLOY_HOST")]
    pub host: Option<IpAddr>,

    /// Shared secret deliveries are signed with
    #[arg(long, env = "AUTODEPLOY_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Per-stage timeout in seconds (0 disables)
    #[arg(long, env = "AUTODEPLOY_STAGE_TIMEOUT")]
    pub stage_timeout: Option<u64>,

    /// Match processes without versioning metadata by inspecting their checkout
    #[arg(long, env = "AUTODEPLOY_LEGACY_REMOTE_INSPECTION")]
    pub legacy_remote_inspection: bool,

    /// pm2 executable
    #[arg(long, env = "AUTODEPLOY_PM2_BIN")]
    pub pm2_bin: Option<String>,

    /// Log output format
    #[arg(long, value_enum, env = "AUTODEPLOY_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// OTLP collector endpoint; tracing spans are exported when set
    #[arg(long, env = "AUTODEPLOY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

/// Contents of the TOML config file: flat, kebab-case keys, all optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub port: Option<u16>,
    pub host: Option<IpAddr>,
    pub secret: Option<String>,
    pub stage_timeout: Option<u64>,
    pub legacy_remote_inspection: Option<bool>,
    pub pm2_bin: Option<String>,
    pub log_format: Option<LogFormat>,
    pub otlp_endpoint: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no webhook secret configured (use --secret, AUTODEPLOY_SECRET or `secret` in the config file)")]
    MissingSecret,

    #[error("the webhook secret must not be empty")]
    EmptySecret,
}

/// Fully resolved settings the daemon runs with.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub listen: SocketAddr,
    pub secret: String,
    pub stage_timeout: Option<Duration>,
    pub legacy_remote_inspection: bool,
    pub pm2_bin: String,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("listen", &self.listen)
            .field("secret", &"<redacted>")
            .field("stage_timeout", &self.stage_timeout)
            .field("legacy_remote_inspection", &self.legacy_remote_inspection)
            .field("pm2_bin", &self.pm2_bin)
            .field("log_format", &self.log_format)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .finish()
    }
}

impl Settings {
    /// Loads the file named by `cli.config`, if any, and resolves.
    pub fn load(cli: Cli) -> Result<Self, ConfigError> {
        let file = match cli.config.as_deref() {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    pub fn resolve(cli: Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let secret = cli.secret.or(file.secret).ok_or(ConfigError::MissingSecret)?;
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        let host = cli.host.or(file.host).unwrap_or(DEFAULT_HOST);
        let port = cli.port.or(file.port).unwrap_or(DEFAULT_PORT);

        let stage_timeout = cli
            .stage_timeout
            .or(file.stage_timeout)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            listen: SocketAddr::new(host, port),
            secret,
            stage_timeout,
            legacy_remote_inspection: cli.legacy_remote_inspection
                || file.legacy_remote_inspection.unwrap_or(false),
            pm2_bin: cli
                .pm2_bin
                .or(file.pm2_bin)
                .unwrap_or_else(|| DEFAULT_PM2_BIN.to_string()),
            log_format: cli.log_format.or(file.log_format).unwrap_or_default(),
            otlp_endpoint: cli.otlp_endpoint.or(file.otlp_endpoint),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-backed args still read the process environment; nothing here sets
    // AUTODEPLOY_* variables.
    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("autodeploy").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_with_only_a_secret() {
        let settings = Settings::resolve(cli(&["--secret", "s3cret"]), FileConfig::default()).unwrap();

        assert_eq!(settings.listen, SocketAddr::new(DEFAULT_HOST, DEFAULT_PORT));
        assert_eq!(settings.secret, "s3cret");
        assert_eq!(settings.stage_timeout, None);
        assert!(!settings.legacy_remote_inspection);
        assert_eq!(settings.pm2_bin, "pm2");
        assert_eq!(settings.log_format, LogFormat::Text);
        assert_eq!(settings.otlp_endpoint, None);
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let err = Settings::resolve(cli(&[]), FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let err = Settings::resolve(cli(&["--secret", ""]), FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptySecret));
    }

    #[test]
    fn test_flags_override_file() {
        let file: FileConfig = toml::from_str(
            r#"
            port = 8080
            host = "127.0.0.1"
            secret = "from-file"
            stage-timeout = 600
            pm2-bin = "/opt/pm2/bin/pm2"
            log-format = "json"
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(
            cli(&["--port", "9000", "--secret", "from-flag", "--stage-timeout", "30"]),
            file,
        )
        .unwrap();

        assert_eq!(settings.listen, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(settings.secret, "from-flag");
        assert_eq!(settings.stage_timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.pm2_bin, "/opt/pm2/bin/pm2");
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_zero_stage_timeout_disables_the_bound() {
        let settings = Settings::resolve(
            cli(&["--secret", "s", "--stage-timeout", "0"]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(settings.stage_timeout, None);
    }

    #[test]
    fn test_legacy_inspection_from_file() {
        let file: FileConfig = toml::from_str("legacy-remote-inspection = true").unwrap();
        let settings = Settings::resolve(cli(&["--secret", "s"]), file).unwrap();
        assert!(settings.legacy_remote_inspection);
    }

    #[test]
    fn test_unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("prot = 80").is_err());
    }

    #[test]
    fn test_load_reads_the_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autodeploy.toml");
        std::fs::write(&path, "secret = \"from-file\"\nport = 7000\n").unwrap();

        let settings = Settings::load(cli(&["--config", path.to_str().unwrap()])).unwrap();

        assert_eq!(settings.secret, "from-file");
        assert_eq!(settings.listen.port(), 7000);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Settings::load(cli(&["--config", "/nonexistent/autodeploy.toml"])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let settings = Settings::resolve(cli(&["--secret", "hunter2"]), FileConfig::default()).unwrap();
        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
