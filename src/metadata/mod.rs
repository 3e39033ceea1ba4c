//! Application metadata and license discovery.
//!
//! Electron applications carry their `package.json` either inside
//! `resources/app.asar` (packaged) or as `resources/app/package.json`
//! (unpackaged). Both locations are probed in that order.

pub mod asar;

use crate::bundler::{Error, ErrorExt, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Package metadata extracted from `package.json`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    /// Package name (`name`)
    #[serde(default)]
    pub name: Option<String>,

    /// Human readable product name (`productName`)
    #[serde(default)]
    pub product_name: Option<String>,

    /// Generic name shown by some desktop environments (`genericName`)
    #[serde(default)]
    pub generic_name: Option<String>,

    /// Short description (`description`)
    #[serde(default)]
    pub description: Option<String>,

    /// Homepage URL, used to derive the application id
    #[serde(default)]
    pub homepage: Option<String>,

    /// Package version (`version`)
    #[serde(default)]
    pub version: Option<String>,
}

/// Places `package.json` can be found in a built application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    /// `resources/app.asar`, entry `package.json`
    Asar,
    /// `resources/app/package.json`
    PlainFile,
}

impl MetadataSource {
    /// Lookup order: packaged archive first, plain file second.
    pub const ORDER: [MetadataSource; 2] = [MetadataSource::Asar, MetadataSource::PlainFile];

    /// Path probed for this source, relative to `src`.
    pub fn path(self, src: &Path) -> PathBuf {
        match self {
            MetadataSource::Asar => src.join("resources/app.asar"),
            MetadataSource::PlainFile => src.join("resources/app/package.json"),
        }
    }

    async fn read(self, src: &Path) -> Result<PackageMetadata> {
        let path = self.path(src);
        log::info!("Reading package metadata from {}", path.display());

        let bytes = match self {
            MetadataSource::Asar => asar::extract_file(&path, "package.json").await?,
            MetadataSource::PlainFile => tokio::fs::read(&path)
                .await
                .fs_context("reading package.json", &path)?,
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Reads `package.json` from the application at `src`.
///
/// Each [`MetadataSource`] is tried in [`MetadataSource::ORDER`]; the first
/// one that reads and parses wins. When all fail the last error is reported.
pub async fn read_metadata(src: &Path) -> Result<PackageMetadata> {
    let mut last_error = None;

    for source in MetadataSource::ORDER {
        match source.read(src).await {
            Ok(metadata) => return Ok(metadata),
            Err(e) => {
                log::debug!("No usable metadata from {:?}: {}", source, e);
                last_error = Some(e);
            }
        }
    }

    Err(Error::Metadata(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no metadata sources configured".to_string()),
    ))
}

/// Reads `LICENSE` from the root of the application.
pub async fn read_license(src: &Path) -> Result<Vec<u8>> {
    let license = src.join("LICENSE");
    log::info!("Reading license file from {}", license.display());

    tokio::fs::read(&license)
        .await
        .fs_context("reading license file", license)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_reads_plain_package_json() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join("resources/app/package.json"),
            br#"{"name":"bartest","productName":"Bar","homepage":"http://foo.com","main":"index.js"}"#,
        );

        let metadata = read_metadata(dir.path()).await.unwrap();
        assert_eq!(metadata.name.as_deref(), Some("bartest"));
        assert_eq!(metadata.product_name.as_deref(), Some("Bar"));
        assert_eq!(metadata.homepage.as_deref(), Some("http://foo.com"));
        assert_eq!(metadata.description, None);
    }

    #[tokio::test]
    async fn test_asar_wins_over_plain_file() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join("resources/app.asar"),
            &asar::pack(&[("package.json", br#"{"name":"from-asar"}"#)]),
        );
        write(
            &dir.path().join("resources/app/package.json"),
            br#"{"name":"from-plain"}"#,
        );

        let metadata = read_metadata(dir.path()).await.unwrap();
        assert_eq!(metadata.name.as_deref(), Some("from-asar"));
    }

    #[tokio::test]
    async fn test_broken_asar_falls_through() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("resources/app.asar"), b"not an archive");
        write(
            &dir.path().join("resources/app/package.json"),
            br#"{"name":"fallback"}"#,
        );

        let metadata = read_metadata(dir.path()).await.unwrap();
        assert_eq!(metadata.name.as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn test_asar_with_oversized_entry_falls_through() {
        let dir = TempDir::new().unwrap();
        let mut archive = asar::pack_index(
            br#"{"files":{"package.json":{"size":18446744073709551615,"offset":"0"}}}"#,
        );
        archive.extend_from_slice(br#"{"name":"from-asar"}"#);
        write(&dir.path().join("resources/app.asar"), &archive);
        write(
            &dir.path().join("resources/app/package.json"),
            br#"{"name":"fallback"}"#,
        );

        let metadata = read_metadata(dir.path()).await.unwrap();
        assert_eq!(metadata.name.as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn test_missing_metadata_is_an_error() {
        let dir = TempDir::new().unwrap();

        let err = read_metadata(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Metadata(_)));
        assert!(err.to_string().starts_with("Error reading package metadata"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("resources/app/package.json"), b"{ nope");

        assert!(matches!(
            read_metadata(dir.path()).await,
            Err(Error::Metadata(_))
        ));
    }

    #[tokio::test]
    async fn test_read_license_surfaces_io_error() {
        let dir = TempDir::new().unwrap();

        let err = read_license(dir.path()).await.unwrap_err();
        match err {
            Error::Fs { error, .. } => assert_eq!(error.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
