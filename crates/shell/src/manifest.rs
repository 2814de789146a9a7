//! [`ManifestSource`] reading `package.json` from the working directory.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use pipeline::{ManifestError, ManifestSource, MANIFEST_FILE_NAME};

#[derive(Debug, Clone, Copy, Default)]
pub struct FsManifestSource;

#[async_trait]
impl ManifestSource for FsManifestSource {
    async fn read(&self, working_directory: &Path) -> Result<Option<String>, ManifestError> {
        let path = working_directory.join(MANIFEST_FILE_NAME);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ManifestError::Read { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_manifest_text_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let text = "{\n  \"name\": \"app\"\n}\n";
        std::fs::write(dir.path().join("package.json"), text).unwrap();

        let read = FsManifestSource.read(dir.path()).await.unwrap();

        assert_eq!(read.as_deref(), Some(text));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FsManifestSource.read(dir.path()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be cannot be read as text.
        std::fs::create_dir(dir.path().join("package.json")).unwrap();

        let err = FsManifestSource.read(dir.path()).await.unwrap_err();

        assert!(matches!(err, ManifestError::Read { .. }));
    }
}
