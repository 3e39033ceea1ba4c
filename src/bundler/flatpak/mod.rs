//! Hand-off to the Flatpak bundler.
//!
//! [`BundleSpec`] is the declarative manifest describing what goes into the
//! bundle; [`FlatpakBundler`] turns it into a `.flatpak` file. The default
//! implementation, [`FlatpakBuilder`], drives the host's `flatpak` and
//! `flatpak-builder` tools.

mod tools;

pub use tools::{FLATPAK_BUILDER_ENV, FLATPAK_ENV, FlatpakBuilder, ToolConfig};

use crate::bundler::error::Result;
use crate::bundler::settings::{InstallerOptions, flatpak_arch};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Manifest handed to the bundler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSpec {
    /// Application id.
    pub id: String,
    /// Flatpak branch.
    pub branch: String,
    /// Base application and where to fetch it from.
    pub base: String,
    /// Branch of `base`.
    pub base_version: String,
    /// Flatpakref location for `base`.
    pub base_flatpakref: String,
    /// Runtime id.
    pub runtime: String,
    /// Runtime branch.
    pub runtime_version: String,
    /// Flatpakref location for `runtime`.
    pub runtime_flatpakref: String,
    /// SDK id.
    pub sdk: String,
    /// SDK branch.
    pub sdk_version: String,
    /// Flatpakref location for `sdk`.
    pub sdk_flatpakref: String,
    /// Sandbox permissions passed to `flatpak build-finish`.
    pub finish_args: Vec<String>,
    /// Command run by `flatpak run`, relative to `/app/bin`.
    pub command: String,
    /// `(source on disk, destination inside /app)` pairs.
    pub files: Vec<(PathBuf, PathBuf)>,
    /// `(target, link)` pairs, both inside `/app`.
    pub symlinks: Vec<(PathBuf, PathBuf)>,
    /// Paths under `/app` exported to the host besides the standard ones.
    pub extra_exports: Vec<PathBuf>,
    /// flatpak-builder module definitions.
    pub modules: Vec<serde_json::Value>,
}

impl BundleSpec {
    /// Builds the manifest for `options` with the staged tree at `staging_dir`.
    ///
    /// The staging directory is mounted at `/`, the application binary is
    /// linked to `/bin/<bin>`, and a pixmap icon is exported explicitly since
    /// Flatpak does not export `share/pixmaps` on its own.
    pub fn from_options(options: &InstallerOptions, staging_dir: &Path) -> Self {
        let mut files = vec![(staging_dir.to_path_buf(), PathBuf::from("/"))];
        files.extend(options.files.iter().cloned());

        let mut symlinks = vec![(
            PathBuf::from("/lib").join(&options.id).join(&options.bin),
            PathBuf::from("/bin").join(&options.bin),
        )];
        symlinks.extend(options.symlinks.iter().cloned());

        let extra_exports = match &options.icon {
            Some(icon) if icon.is_pixmap() => vec![options.pixmap_path()],
            _ => Vec::new(),
        };

        Self {
            id: options.id.clone(),
            branch: options.branch.clone(),
            base: options.base.clone(),
            base_version: options.base_version.clone(),
            base_flatpakref: options.base_flatpakref.clone(),
            runtime: options.runtime.clone(),
            runtime_version: options.runtime_version.clone(),
            runtime_flatpakref: options.runtime_flatpakref.clone(),
            sdk: options.sdk.clone(),
            sdk_version: options.sdk_version.clone(),
            sdk_flatpakref: options.sdk_flatpakref.clone(),
            finish_args: options.finish_args.clone(),
            command: options.bin.clone(),
            files,
            symlinks,
            extra_exports,
            modules: options.modules.clone(),
        }
    }
}

/// Build parameters that are not part of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOptions {
    /// Flatpak architecture name (`x86_64`, `i386`, `aarch64`, `arm`).
    pub arch: String,
    /// Where the `.flatpak` file is written.
    pub bundle_path: PathBuf,
}

impl BundleOptions {
    /// Maps the requested architecture and computes the bundle path.
    pub fn from_options(options: &InstallerOptions) -> Result<Self> {
        Ok(Self {
            arch: flatpak_arch(&options.arch)?.to_string(),
            bundle_path: options.bundle_path(),
        })
    }
}

/// Produces a `.flatpak` bundle from a [`BundleSpec`].
///
/// Implementations may take a long time and spawn subprocesses. They return
/// the path of the written bundle.
pub trait FlatpakBundler {
    /// Builds the bundle described by `spec`.
    fn bundle(
        &self,
        spec: &BundleSpec,
        options: &BundleOptions,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}
