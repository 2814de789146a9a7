//! Project manifest (`package.json`) interpretation.
//!
//! The orchestrator only needs two things from a manifest: whether it changed
//! across a pull, and which install/build commands it declares under the
//! reserved script keys.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::ManifestError;

/// File name of the manifest inside each working directory.
pub const MANIFEST_FILE_NAME: &str = "package.json";

/// Script key overriding the dependency install command.
pub const INSTALL_SCRIPT_KEY: &str = "autoReloadInstall";

/// Script key declaring the build command run after every pull.
pub const BUILD_SCRIPT_KEY: &str = "autoUpdateBuild";

/// Install command used when the manifest declares no override.
pub const DEFAULT_INSTALL_COMMAND: &str = "npm install";

/// The parts of a manifest the update pipeline reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    scripts: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    scripts: BTreeMap<String, serde_json::Value>,
}

impl Manifest {
    /// Parses manifest text. Script entries whose value is not a string are
    /// ignored.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest = serde_json::from_str(text)?;
        let scripts = raw
            .scripts
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();
        Ok(Self { scripts })
    }

    /// Command to run when dependencies changed.
    pub fn install_command(&self) -> &str {
        self.script(INSTALL_SCRIPT_KEY)
            .unwrap_or(DEFAULT_INSTALL_COMMAND)
    }

    /// Build command, if the manifest declares one.
    pub fn build_command(&self) -> Option<&str> {
        self.script(BUILD_SCRIPT_KEY)
    }

    fn script(&self, key: &str) -> Option<&str> {
        self.scripts
            .get(key)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Whether a pull changed the dependency manifest.
///
/// Only a textual difference between two existing manifests counts. A manifest
/// that appeared or disappeared is "unknown" and does not trigger an install.
pub fn dependencies_changed(before: Option<&str>, after: Option<&str>) -> bool {
    matches!((before, after), (Some(b), Some(a)) if b != a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_install_command() {
        let manifest = Manifest::parse(r#"{"name":"app","scripts":{"start":"node ."}}"#).unwrap();
        assert_eq!(manifest.install_command(), "npm install");
        assert_eq!(manifest.build_command(), None);
    }

    #[test]
    fn test_reserved_script_keys() {
        let manifest = Manifest::parse(
            r#"{"scripts":{"autoReloadInstall":"pnpm install --frozen-lockfile","autoUpdateBuild":"pnpm build"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.install_command(), "pnpm install --frozen-lockfile");
        assert_eq!(manifest.build_command(), Some("pnpm build"));
    }

    #[test]
    fn test_manifest_without_scripts() {
        let manifest = Manifest::parse(r#"{"name":"app"}"#).unwrap();
        assert_eq!(manifest, Manifest::default());
    }

    #[test]
    fn test_non_string_and_blank_scripts_ignored() {
        let manifest =
            Manifest::parse(r#"{"scripts":{"autoUpdateBuild":42,"autoReloadInstall":"  "}}"#)
                .unwrap();
        assert_eq!(manifest.build_command(), None);
        assert_eq!(manifest.install_command(), DEFAULT_INSTALL_COMMAND);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            Manifest::parse("{not json"),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn test_dependencies_changed() {
        assert!(!dependencies_changed(Some("{}"), Some("{}")));
        assert!(dependencies_changed(Some("{}"), Some(r#"{"a":1}"#)));
        assert!(!dependencies_changed(None, Some("{}")));
        assert!(!dependencies_changed(Some("{}"), None));
        assert!(!dependencies_changed(None, None));
    }
}
