//! File system utilities for staging.
//!
//! Provides file operations with automatic directory creation,
//! symlink preservation, and path-tagged errors.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::{io, path::Path};
use tokio::fs;

/// Writes `contents` to `path`, creating any parent directories as needed.
pub async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }
    fs::write(path, contents).await.fs_context("writing file", path)
}

/// Makes a symbolic link to a directory.
#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a directory.
#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(unix)]
pub(crate) fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(windows)]
pub(crate) fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    let metadata = fs::metadata(from).await.fs_context("reading", from)?;
    if !metadata.is_file() {
        return Err(Error::GenericError(format!("{from:?} is not a file")));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying to", to)?;
    Ok(())
}

/// Recursively copies the contents of a directory into another one, creating
/// the destination and its parents as necessary.
///
/// Symlinks are recreated rather than followed. Fails if the source path is
/// not a directory or doesn't exist.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    let metadata = fs::metadata(from).await.fs_context("reading", from)?;
    if !metadata.is_dir() {
        return Err(Error::GenericError(format!("{from:?} is not a directory")));
    }

    for entry in walkdir::WalkDir::new(from) {
        let entry = entry?;
        debug_assert!(entry.path().starts_with(from));
        let rel_path = entry.path().strip_prefix(from)?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_symlink() {
            let target = fs::read_link(entry.path())
                .await
                .fs_context("reading symlink", entry.path())?;
            if entry.path().is_dir() {
                symlink_dir(&target, &dest_path).fs_context("creating symlink", &dest_path)?;
            } else {
                symlink_file(&target, &dest_path).fs_context("creating symlink", &dest_path)?;
            }
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .await
                .fs_context("creating directory", &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)
                .await
                .fs_context("copying to", &dest_path)?;
        }
    }

    Ok(())
}

/// Copies `src` (file or directory) to `dest`.
pub async fn copy_path(src: &Path, dest: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir(src, dest).await
    } else {
        copy_file(src, dest).await
    }
}

/// Joins an absolute in-bundle path (`/bin/app`) onto a directory.
pub fn join_rooted(root: &Path, path: &Path) -> std::path::PathBuf {
    root.join(path.strip_prefix("/").unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_dir_recurses() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("resources/app")).unwrap();
        std::fs::write(src.join("app"), b"bin").unwrap();
        std::fs::write(src.join("resources/app/package.json"), b"{}").unwrap();

        let dest = dir.path().join("out/lib/app");
        copy_dir(&src, &dest).await.unwrap();

        assert_eq!(std::fs::read(dest.join("app")).unwrap(), b"bin");
        assert!(dest.join("resources/app/package.json").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_dir_preserves_symlinks() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("real"), b"x").unwrap();
        std::os::unix::fs::symlink("real", src.join("link")).unwrap();

        let dest = dir.path().join("dest");
        copy_dir(&src, &dest).await.unwrap();

        let link = std::fs::read_link(dest.join("link")).unwrap();
        assert_eq!(link, Path::new("real"));
    }

    #[tokio::test]
    async fn test_copy_file_rejects_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = copy_file(&dir.path().join("nope.png"), &dir.path().join("x.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fs { .. }));
    }

    #[test]
    fn test_join_rooted() {
        assert_eq!(
            join_rooted(Path::new("/build/files"), Path::new("/bin/app")),
            Path::new("/build/files/bin/app")
        );
        assert_eq!(
            join_rooted(Path::new("/build/files"), Path::new("lib/x")),
            Path::new("/build/files/lib/x")
        );
    }
}
