//! Minimal reader for Electron `.asar` archives.
//!
//! An asar archive is a Chromium pickle holding a JSON directory index,
//! followed by the concatenated file contents:
//!
//! ```text
//! [u32 = 4][u32 header_size][u32 payload_size][u32 json_len][json ...][padding][file data ...]
//! ```
//!
//! Only reading single entries is supported; that is all packaging needs.

use crate::bundler::{Error, ErrorExt, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Directory index node.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Node {
    Directory {
        files: HashMap<String, Node>,
    },
    File {
        size: u64,
        #[serde(default)]
        offset: Option<String>,
        #[serde(default)]
        unpacked: bool,
    },
    Link {
        #[allow(dead_code)]
        link: String,
    },
}

/// Reads one file out of an asar archive.
///
/// `entry` is a slash separated path relative to the archive root, for
/// example `package.json` or `dist/main.js`. Entries flagged as unpacked are
/// read from the sibling `<archive>.unpacked/` directory.
pub async fn extract_file(archive: &Path, entry: &str) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(archive)
        .await
        .fs_context("opening asar archive", archive)?;
    let archive_len = file
        .metadata()
        .await
        .fs_context("reading asar archive metadata", archive)?
        .len();

    let mut prefix = [0u8; 8];
    file.read_exact(&mut prefix)
        .await
        .fs_context("reading asar header size", archive)?;
    let header_size = u64::from(u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]));

    // Sizes come from the archive itself; check them before allocating
    if header_size > archive_len.saturating_sub(8) {
        return Err(malformed(archive, "header size exceeds the archive"));
    }
    let mut header = vec![0u8; to_len(archive, header_size)?];
    file.read_exact(&mut header)
        .await
        .fs_context("reading asar header", archive)?;
    let index = parse_header(archive, &header)?;

    let node = lookup(&index, entry).ok_or_else(|| Error::Asar {
        path: archive.to_path_buf(),
        reason: format!("no entry named {entry}"),
    })?;

    match node {
        Node::File {
            unpacked: true, ..
        } => {
            let unpacked = unpacked_path(archive, entry);
            tokio::fs::read(&unpacked)
                .await
                .fs_context("reading unpacked asar entry", unpacked)
        }
        Node::File { size, offset, .. } => {
            let offset: u64 = offset
                .as_deref()
                .unwrap_or("0")
                .parse()
                .map_err(|_| malformed(archive, &format!("entry {entry} has a malformed offset")))?;

            let start = (8 + header_size)
                .checked_add(offset)
                .filter(|start| start.checked_add(*size).is_some_and(|end| end <= archive_len))
                .ok_or_else(|| malformed(archive, &format!("entry {entry} runs past the archive")))?;

            file.seek(SeekFrom::Start(start))
                .await
                .fs_context("seeking asar entry", archive)?;
            let mut contents = vec![0u8; to_len(archive, *size)?];
            file.read_exact(&mut contents)
                .await
                .fs_context("reading asar entry", archive)?;
            Ok(contents)
        }
        Node::Directory { .. } | Node::Link { .. } => Err(Error::Asar {
            path: archive.to_path_buf(),
            reason: format!("entry {entry} is not a regular file"),
        }),
    }
}

fn malformed(archive: &Path, reason: &str) -> Error {
    Error::Asar {
        path: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn to_len(archive: &Path, size: u64) -> Result<usize> {
    usize::try_from(size).map_err(|_| malformed(archive, "size does not fit in memory"))
}

fn parse_header(archive: &Path, header: &[u8]) -> Result<Node> {
    if header.len() < 8 {
        return Err(malformed(archive, "header pickle is truncated"));
    }
    let json_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let json = 8usize
        .checked_add(json_len)
        .and_then(|end| header.get(8..end))
        .ok_or_else(|| malformed(archive, "header string runs past the header"))?;

    serde_json::from_slice(json).map_err(|e| malformed(archive, &format!("header index: {e}")))
}

fn lookup<'a>(root: &'a Node, entry: &str) -> Option<&'a Node> {
    entry
        .split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(root, |node, segment| match node {
            Node::Directory { files } => files.get(segment),
            _ => None,
        })
}

fn unpacked_path(archive: &Path, entry: &str) -> PathBuf {
    let mut dir = archive.as_os_str().to_owned();
    dir.push(".unpacked");
    entry
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(PathBuf::from(dir), |path, segment| path.join(segment))
}

/// Writes a flat asar archive containing the given files. Test fixture helper.
#[cfg(test)]
pub(crate) fn pack(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut index = serde_json::Map::new();
    let mut offset = 0u64;
    for (name, contents) in files {
        index.insert(
            (*name).to_string(),
            serde_json::json!({ "size": contents.len(), "offset": offset.to_string() }),
        );
        offset += contents.len() as u64;
    }
    let json = serde_json::to_vec(&serde_json::json!({ "files": index })).unwrap();

    let mut out = pack_index(&json);
    for (_, contents) in files {
        out.extend_from_slice(contents);
    }
    out
}

/// Writes just the header of an archive around a raw JSON index.
#[cfg(test)]
pub(crate) fn pack_index(json: &[u8]) -> Vec<u8> {
    let padding = (4 - json.len() % 4) % 4;
    let payload_size = 4 + json.len() + padding;
    let header_size = 4 + payload_size;

    let mut out = Vec::new();
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&(header_size as u32).to_le_bytes());
    out.extend_from_slice(&(payload_size as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(json);
    out.extend(std::iter::repeat_n(0u8, padding));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_second_entry() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("app.asar");
        std::fs::write(
            &archive,
            pack(&[("index.js", b"console.log(1)"), ("package.json", b"{\"name\":\"x\"}")]),
        )
        .unwrap();

        let contents = extract_file(&archive, "package.json").await.unwrap();
        assert_eq!(contents, b"{\"name\":\"x\"}");
    }

    #[tokio::test]
    async fn test_missing_entry_is_reported() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("app.asar");
        std::fs::write(&archive, pack(&[("index.js", b"1")])).unwrap();

        let err = extract_file(&archive, "package.json").await.unwrap_err();
        assert!(matches!(err, Error::Asar { .. }));
        assert!(err.to_string().contains("no entry named package.json"));
    }

    #[tokio::test]
    async fn test_unpacked_entry_reads_sibling_dir() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("app.asar");

        let json = br#"{"files":{"native":{"files":{"addon.node":{"size":3,"unpacked":true}}}}}"#;
        std::fs::write(&archive, pack_index(json)).unwrap();

        let unpacked = dir.path().join("app.asar.unpacked/native");
        std::fs::create_dir_all(&unpacked).unwrap();
        std::fs::write(unpacked.join("addon.node"), b"elf").unwrap();

        let contents = extract_file(&archive, "native/addon.node").await.unwrap();
        assert_eq!(contents, b"elf");
    }

    #[tokio::test]
    async fn test_oversized_entry_is_rejected() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("app.asar");
        let mut bytes =
            pack_index(br#"{"files":{"package.json":{"size":18446744073709551615,"offset":"0"}}}"#);
        bytes.extend_from_slice(b"{}");
        std::fs::write(&archive, bytes).unwrap();

        let err = extract_file(&archive, "package.json").await.unwrap_err();
        assert!(matches!(err, Error::Asar { .. }));
        assert!(err.to_string().contains("runs past the archive"));
    }

    #[tokio::test]
    async fn test_entry_past_end_is_rejected() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("app.asar");
        let mut bytes = pack_index(br#"{"files":{"package.json":{"size":64,"offset":"0"}}}"#);
        bytes.extend_from_slice(b"{}");
        std::fs::write(&archive, bytes).unwrap();

        let err = extract_file(&archive, "package.json").await.unwrap_err();
        assert!(err.to_string().contains("runs past the archive"));
    }

    #[tokio::test]
    async fn test_header_size_beyond_archive_is_rejected() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("app.asar");
        let mut bytes = pack(&[("package.json", b"{}")]);
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        std::fs::write(&archive, bytes).unwrap();

        let err = extract_file(&archive, "package.json").await.unwrap_err();
        assert!(matches!(err, Error::Asar { .. }));
    }

    #[tokio::test]
    async fn test_truncated_archive_fails() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("app.asar");
        std::fs::write(&archive, [4u8, 0, 0]).unwrap();

        assert!(extract_file(&archive, "package.json").await.is_err());
    }
}
