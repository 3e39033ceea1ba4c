//! Staging tree assembly.
//!
//! The staging directory mirrors the layout Flatpak installs under `/app`:
//!
//! ```text
//! <staging>/
//!   ├── share/applications/<id>.desktop
//!   ├── share/pixmaps/<id>.png                   (single icon)
//!   ├── share/icons/hicolor/<res>/apps/<id>.png  (icon per resolution)
//!   ├── share/doc/<id>/copyright
//!   └── lib/<id>/...                             (the application)
//! ```

use crate::bundler::error::{Context, ErrorExt, Result};
use crate::bundler::settings::{IconSource, InstallerOptions};
use crate::bundler::template::render_desktop_entry;
use crate::bundler::utils::fs::{copy_dir, copy_file, join_rooted, write_file};
use crate::metadata::read_license;
use std::path::{Path, PathBuf};

/// Generic application icon used when the caller provides none.
pub const BUNDLED_ICON: &[u8] = include_bytes!("../../resources/icon.png");

/// Creates a fresh staging directory for `options`.
///
/// The directory is `<random temp root>/<id>_<version>_<arch>` and is left on
/// disk; removing it is up to the caller.
pub async fn create_staging_dir(options: &InstallerOptions) -> Result<PathBuf> {
    log::info!("Creating temporary directory");

    let root = tempfile::Builder::new()
        .prefix("electron-")
        .tempdir()
        .fs_context("creating temporary directory", std::env::temp_dir())
        .context("Error creating temporary directory")?
        .keep();

    let dir = root.join(options.staging_dir_name());
    tokio::fs::create_dir_all(&dir)
        .await
        .fs_context("creating staging directory", &dir)
        .context("Error creating temporary directory")?;

    Ok(dir)
}

/// Populates `dir` with the desktop file, icon(s), copyright and application.
///
/// The four steps write to disjoint subtrees and run concurrently. All of them
/// run to completion. When several fail, the error reported is the first in
/// the fixed order desktop, icon, copyright, application, not the first to
/// complete, so the same broken input always reports the same stage.
pub async fn create_contents(options: &InstallerOptions, dir: &Path) -> Result<()> {
    log::info!("Creating contents of package");

    let (desktop, icon, copyright, application) = tokio::join!(
        create_desktop(options, dir),
        create_icon(options, dir),
        create_copyright(options, dir),
        create_application(options, dir),
    );

    desktop?;
    icon?;
    copyright?;
    application?;
    Ok(())
}

/// Writes `share/applications/<id>.desktop`.
///
/// See: <http://standards.freedesktop.org/desktop-entry-spec/latest/>
async fn create_desktop(options: &InstallerOptions, dir: &Path) -> Result<()> {
    let dest = dir
        .join("share/applications")
        .join(format!("{}.desktop", options.id));
    log::debug!("Creating desktop file at {}", dest.display());

    async {
        let entry = render_desktop_entry(options).await?;
        write_file(&dest, entry).await
    }
    .await
    .context("Error creating desktop file")
}

/// Stages the icon(s), if any.
async fn create_icon(options: &InstallerOptions, dir: &Path) -> Result<()> {
    let result = match &options.icon {
        Some(IconSource::Bundled) => {
            let dest = join_rooted(dir, &options.pixmap_path());
            log::debug!("Creating icon file at {}", dest.display());
            write_file(&dest, BUNDLED_ICON).await
        }
        Some(IconSource::Pixmap(icon)) => {
            let dest = join_rooted(dir, &options.pixmap_path());
            log::debug!("Creating icon file at {}", dest.display());
            copy_file(icon, &dest).await
        }
        Some(IconSource::Hicolor(icons)) => create_hicolor_icons(options, icons, dir).await,
        None => Ok(()),
    };

    result.context("Error creating icon file")
}

async fn create_hicolor_icons(
    options: &InstallerOptions,
    icons: &std::collections::BTreeMap<String, PathBuf>,
    dir: &Path,
) -> Result<()> {
    for (resolution, icon) in icons {
        let dest = dir
            .join("share/icons/hicolor")
            .join(resolution)
            .join("apps")
            .join(format!("{}.png", options.id));
        log::debug!("Creating icon file at {}", dest.display());

        copy_file(icon, &dest).await?;
    }
    Ok(())
}

/// Writes `share/doc/<id>/copyright` from the application's `LICENSE`.
async fn create_copyright(options: &InstallerOptions, dir: &Path) -> Result<()> {
    let dest = dir.join("share/doc").join(&options.id).join("copyright");
    log::debug!("Creating copyright file at {}", dest.display());

    async {
        let license = read_license(&options.src).await?;
        write_file(&dest, license).await
    }
    .await
    .context("Error creating copyright file")
}

/// Copies the application into `lib/<id>/`.
async fn create_application(options: &InstallerOptions, dir: &Path) -> Result<()> {
    let dest = dir.join("lib").join(&options.id);
    log::debug!("Copying application to {}", dest.display());

    copy_dir(&options.src, &dest)
        .await
        .context("Error copying application directory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::Error;
    use crate::bundler::settings::{InstallRequest, UserOptions};
    use crate::metadata::PackageMetadata;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn fixture_app(root: &Path) -> PathBuf {
        let src = root.join("app");
        std::fs::create_dir_all(src.join("resources/app")).unwrap();
        std::fs::write(src.join("footest"), b"#!/bin/sh\n").unwrap();
        std::fs::write(src.join("LICENSE"), b"MIT License").unwrap();
        std::fs::write(src.join("resources/app/package.json"), br#"{"name":"footest"}"#).unwrap();
        src
    }

    fn options(src: PathBuf, user: UserOptions) -> InstallerOptions {
        let request = InstallRequest {
            src,
            dest: "out".into(),
            options: user,
            rename: None,
        };
        let metadata = PackageMetadata {
            name: Some("footest".into()),
            version: Some("0.1.0".into()),
            ..Default::default()
        };
        InstallerOptions::resolve(&request, &metadata).unwrap()
    }

    #[tokio::test]
    async fn test_staging_dir_is_keyed_by_id_version_arch() {
        let dir = TempDir::new().unwrap();
        let opts = options(
            fixture_app(dir.path()),
            UserOptions {
                arch: Some("ia32".into()),
                ..Default::default()
            },
        );

        let staging = create_staging_dir(&opts).await.unwrap();
        assert!(staging.is_dir());
        assert!(staging.ends_with("io.atom.electron.footest_0.1.0_ia32"));

        let other = create_staging_dir(&opts).await.unwrap();
        assert_ne!(staging, other);

        for path in [&staging, &other] {
            std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
        }
    }

    #[tokio::test]
    async fn test_contents_with_bundled_icon() {
        let dir = TempDir::new().unwrap();
        let opts = options(fixture_app(dir.path()), UserOptions::default());
        let staging = dir.path().join("staging");

        create_contents(&opts, &staging).await.unwrap();

        let id = "io.atom.electron.footest";
        assert!(staging.join(format!("share/applications/{id}.desktop")).is_file());
        assert_eq!(
            std::fs::read(staging.join(format!("share/pixmaps/{id}.png"))).unwrap(),
            BUNDLED_ICON
        );
        assert_eq!(
            std::fs::read(staging.join(format!("share/doc/{id}/copyright"))).unwrap(),
            b"MIT License"
        );
        assert!(staging.join(format!("lib/{id}/footest")).is_file());
        assert!(staging.join(format!("lib/{id}/resources/app/package.json")).is_file());
        assert!(!staging.join("share/icons").exists());
    }

    #[tokio::test]
    async fn test_contents_with_hicolor_icons() {
        let dir = TempDir::new().unwrap();
        let src = fixture_app(dir.path());
        let icon = dir.path().join("icon.png");
        std::fs::write(&icon, BUNDLED_ICON).unwrap();

        let icons = BTreeMap::from([
            ("16x16".to_string(), icon.clone()),
            ("1024x1024".to_string(), icon),
        ]);
        let opts = options(
            src,
            UserOptions {
                icon: Some(IconSource::Hicolor(icons)),
                ..Default::default()
            },
        );
        let staging = dir.path().join("staging");

        create_contents(&opts, &staging).await.unwrap();

        let hicolor = staging.join("share/icons/hicolor");
        assert_eq!(std::fs::read_dir(&hicolor).unwrap().count(), 2);
        assert!(hicolor.join("16x16/apps/io.atom.electron.footest.png").is_file());
        assert!(hicolor.join("1024x1024/apps/io.atom.electron.footest.png").is_file());
        assert!(!staging.join("share/pixmaps").exists());
    }

    #[tokio::test]
    async fn test_no_icon_stages_nothing() {
        let dir = TempDir::new().unwrap();
        let opts = options(
            fixture_app(dir.path()),
            UserOptions {
                no_icon: Some(true),
                ..Default::default()
            },
        );
        let staging = dir.path().join("staging");

        create_contents(&opts, &staging).await.unwrap();
        assert!(!staging.join("share/pixmaps").exists());
        assert!(!staging.join("share/icons").exists());
    }

    #[tokio::test]
    async fn test_missing_license_fails_but_others_finish() {
        let dir = TempDir::new().unwrap();
        let src = fixture_app(dir.path());
        std::fs::remove_file(src.join("LICENSE")).unwrap();
        let opts = options(src, UserOptions::default());
        let staging = dir.path().join("staging");

        let err = create_contents(&opts, &staging).await.unwrap_err();
        assert!(matches!(err, Error::Context(ref msg, _) if msg == "Error creating copyright file"));

        // Independent steps still ran to completion
        assert!(staging.join("lib/io.atom.electron.footest/footest").is_file());
        assert!(
            staging
                .join("share/applications/io.atom.electron.footest.desktop")
                .is_file()
        );
    }

    #[tokio::test]
    async fn test_missing_icon_reports_icon_stage() {
        let dir = TempDir::new().unwrap();
        let opts = options(
            fixture_app(dir.path()),
            UserOptions {
                icon: Some(IconSource::Pixmap(dir.path().join("missing.png"))),
                ..Default::default()
            },
        );

        let err = create_contents(&opts, &dir.path().join("staging"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Error creating icon file"));
    }

    #[tokio::test]
    async fn test_several_failures_report_in_fixed_order() {
        let dir = TempDir::new().unwrap();
        let src = fixture_app(dir.path());
        std::fs::remove_file(src.join("LICENSE")).unwrap();
        let opts = options(
            src,
            UserOptions {
                icon: Some(IconSource::Pixmap(dir.path().join("missing.png"))),
                ..Default::default()
            },
        );

        // Icon and copyright both fail
        let err = create_contents(&opts, &dir.path().join("staging"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Context(ref msg, _) if msg == "Error creating icon file"));
    }
}
