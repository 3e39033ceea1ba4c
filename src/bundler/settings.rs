//! Installer configuration.
//!
//! Options are layered: built-in defaults, then values derived from the
//! application's `package.json`, then explicit [`UserOptions`] (config file
//! and command-line flags). [`InstallerOptions::resolve`] performs the merge
//! once per run; the result is never mutated afterwards.

use crate::bundler::app_id::derive_app_id;
use crate::bundler::error::{Error, Result};
use crate::metadata::PackageMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default Flatpak branch.
pub const DEFAULT_BRANCH: &str = "master";

/// Electron base application layered under the app.
pub const DEFAULT_BASE: &str = "io.atom.electron.BaseApp";
/// Branch of [`DEFAULT_BASE`].
pub const DEFAULT_BASE_VERSION: &str = "master";
/// Where [`DEFAULT_BASE`] can be installed from.
pub const DEFAULT_BASE_FLATPAKREF: &str = "https://s3-us-west-2.amazonaws.com/electron-flatpak.endlessm.com/electron-base-app-master.flatpakref";

/// Runtime the application runs against.
pub const DEFAULT_RUNTIME: &str = "org.freedesktop.Platform";
/// Version of [`DEFAULT_RUNTIME`] (and of the SDK unless overridden).
pub const DEFAULT_RUNTIME_VERSION: &str = "1.4";
/// Where [`DEFAULT_RUNTIME`] can be installed from.
pub const DEFAULT_RUNTIME_FLATPAKREF: &str = "https://raw.githubusercontent.com/endlessm/flatpak-bundler/master/refs/freedesktop-runtime-1.4.flatpakref";

/// SDK used to build the application.
pub const DEFAULT_SDK: &str = "org.freedesktop.Sdk";
/// Where [`DEFAULT_SDK`] can be installed from.
pub const DEFAULT_SDK_FLATPAKREF: &str = "https://raw.githubusercontent.com/endlessm/flatpak-bundler/master/refs/freedesktop-sdk-1.4.flatpakref";

/// Sandbox permissions granted to Electron applications.
pub const DEFAULT_FINISH_ARGS: &[&str] = &[
    // X rendering
    "--socket=x11",
    "--share=ipc",
    // OpenGL
    "--device=dri",
    // Audio output
    "--socket=pulseaudio",
    // Read/write home directory access
    "--filesystem=home",
    // Chromium keeps its singleton socket in /tmp
    "--filesystem=/tmp",
    "--share=network",
    // libnotify
    "--talk-name=org.freedesktop.Notifications",
];

/// Desktop entry categories.
pub const DEFAULT_CATEGORIES: &[&str] = &["GNOME", "GTK", "Utility"];

/// Version used in staging paths when `package.json` has none.
pub const FALLBACK_VERSION: &str = "0.0.0";

/// Where the application icon comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IconSource {
    /// The generic icon shipped with this crate, staged as a pixmap.
    #[serde(skip_deserializing)]
    Bundled,

    /// A single PNG, staged as `share/pixmaps/<id>.png`.
    Pixmap(PathBuf),

    /// PNGs keyed by resolution (`"256x256"`), staged into the hicolor theme.
    Hicolor(BTreeMap<String, PathBuf>),
}

impl IconSource {
    /// Whether the icon lands in `share/pixmaps` and must be exported explicitly.
    pub fn is_pixmap(&self) -> bool {
        matches!(self, IconSource::Bundled | IconSource::Pixmap(_))
    }
}

/// Computes the bundle destination from the output directory and file name.
#[derive(Clone)]
pub struct Rename(Arc<dyn Fn(&Path, &str) -> PathBuf + Send + Sync>);

impl Rename {
    /// Wraps a custom rename function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Path, &str) -> PathBuf + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Applies the function.
    pub fn apply(&self, dest: &Path, file_name: &str) -> PathBuf {
        (self.0)(dest, file_name)
    }
}

impl Default for Rename {
    fn default() -> Self {
        Self::new(|dest, file_name| dest.join(file_name))
    }
}

impl fmt::Debug for Rename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rename(<fn>)")
    }
}

/// Explicit options supplied by the caller.
///
/// Every field is optional; `None` means "use the metadata-derived value or
/// the default". Keys follow the camelCase names used in JSON config files.
/// Keys this crate does not know (`section`, `priority` and the like from
/// shared installer configs) are kept in `extra` and handed to templates.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOptions {
    pub id: Option<String>,
    pub product_name: Option<String>,
    pub generic_name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub branch: Option<String>,
    pub arch: Option<String>,
    pub base: Option<String>,
    pub base_version: Option<String>,
    pub base_flatpakref: Option<String>,
    pub runtime: Option<String>,
    pub runtime_version: Option<String>,
    pub runtime_flatpakref: Option<String>,
    pub sdk: Option<String>,
    pub sdk_version: Option<String>,
    pub sdk_flatpakref: Option<String>,
    pub finish_args: Option<Vec<String>>,
    /// flatpak-builder module definitions, passed through untouched.
    pub modules: Option<Vec<serde_json::Value>>,
    pub bin: Option<String>,
    pub icon: Option<IconSource>,
    /// Stage no icon at all, overriding the bundled default.
    pub no_icon: Option<bool>,
    /// Extra `(source, destination)` pairs copied into the bundle.
    pub files: Option<Vec<(PathBuf, PathBuf)>>,
    /// Extra `(target, link)` pairs created inside the bundle.
    pub symlinks: Option<Vec<(PathBuf, PathBuf)>>,
    pub categories: Option<Vec<String>>,
    pub mime_type: Option<Vec<String>>,
    pub desktop_template: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl UserOptions {
    /// Loads options from a JSON config file.
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        use crate::bundler::error::{Context, ErrorExt};

        let contents = tokio::fs::read(path)
            .await
            .fs_context("reading config file", path)?;
        serde_json::from_slice(&contents)
            .map_err(Error::from)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Returns `self` with every option set in `over` replaced by that value.
    ///
    /// `icon` and `noIcon` are one choice: whichever layer sets either of
    /// them decides both.
    pub fn overlay(mut self, over: UserOptions) -> UserOptions {
        let (icon, no_icon) = if over.icon.is_some() || over.no_icon.is_some() {
            (over.icon, over.no_icon)
        } else {
            (self.icon, self.no_icon)
        };
        self.extra.extend(over.extra);

        UserOptions {
            id: over.id.or(self.id),
            product_name: over.product_name.or(self.product_name),
            generic_name: over.generic_name.or(self.generic_name),
            description: over.description.or(self.description),
            version: over.version.or(self.version),
            branch: over.branch.or(self.branch),
            arch: over.arch.or(self.arch),
            base: over.base.or(self.base),
            base_version: over.base_version.or(self.base_version),
            base_flatpakref: over.base_flatpakref.or(self.base_flatpakref),
            runtime: over.runtime.or(self.runtime),
            runtime_version: over.runtime_version.or(self.runtime_version),
            runtime_flatpakref: over.runtime_flatpakref.or(self.runtime_flatpakref),
            sdk: over.sdk.or(self.sdk),
            sdk_version: over.sdk_version.or(self.sdk_version),
            sdk_flatpakref: over.sdk_flatpakref.or(self.sdk_flatpakref),
            finish_args: over.finish_args.or(self.finish_args),
            modules: over.modules.or(self.modules),
            bin: over.bin.or(self.bin),
            icon,
            no_icon,
            files: over.files.or(self.files),
            symlinks: over.symlinks.or(self.symlinks),
            categories: over.categories.or(self.categories),
            mime_type: over.mime_type.or(self.mime_type),
            desktop_template: over.desktop_template.or(self.desktop_template),
            extra: self.extra,
        }
    }
}

/// One packaging request.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    /// Built application directory.
    pub src: PathBuf,
    /// Directory the bundle is written to.
    pub dest: PathBuf,
    /// Explicit overrides.
    pub options: UserOptions,
    /// Custom bundle destination; defaults to `dest/<file name>`.
    pub rename: Option<Rename>,
}

/// Fully resolved options for one packaging run.
#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallerOptions {
    pub src: PathBuf,
    pub dest: PathBuf,
    pub id: String,
    pub product_name: Option<String>,
    pub generic_name: Option<String>,
    pub description: Option<String>,
    pub version: String,
    pub branch: String,
    pub arch: String,
    pub base: String,
    pub base_version: String,
    pub base_flatpakref: String,
    pub runtime: String,
    pub runtime_version: String,
    pub runtime_flatpakref: String,
    pub sdk: String,
    pub sdk_version: String,
    pub sdk_flatpakref: String,
    pub finish_args: Vec<String>,
    pub modules: Vec<serde_json::Value>,
    pub bin: String,
    pub icon: Option<IconSource>,
    pub files: Vec<(PathBuf, PathBuf)>,
    pub symlinks: Vec<(PathBuf, PathBuf)>,
    pub categories: Vec<String>,
    pub mime_type: Vec<String>,
    pub desktop_template: Option<PathBuf>,
    /// Unrecognized config keys, visible to templates by their own names.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
    #[serde(skip)]
    pub rename: Rename,
}

impl InstallerOptions {
    /// Merges explicit options over metadata-derived values over defaults.
    ///
    /// # Errors
    ///
    /// Fails when no id was given and `package.json` has no `name` to derive
    /// one from, when the derived id cannot be shortened enough, or when the
    /// architecture has no Flatpak name.
    pub fn resolve(request: &InstallRequest, metadata: &PackageMetadata) -> Result<Self> {
        let opts = request.options.clone();

        let id = match opts.id {
            Some(id) => id,
            None => {
                let name = metadata.name.as_deref().ok_or_else(|| {
                    Error::Metadata("package.json has no `name` to derive an id from".into())
                })?;
                derive_app_id(name, metadata.homepage.as_deref())?
            }
        };

        let meta_product_name = metadata.product_name.clone().or_else(|| metadata.name.clone());
        let meta_generic_name = metadata
            .generic_name
            .clone()
            .or_else(|| meta_product_name.clone());
        let runtime_version = opts
            .runtime_version
            .unwrap_or_else(|| DEFAULT_RUNTIME_VERSION.to_string());

        let arch = opts.arch.unwrap_or_else(host_arch);
        flatpak_arch(&arch)?;

        for key in opts.extra.keys() {
            log::debug!("Passing unrecognized option `{key}` through to templates");
        }

        let icon = if opts.no_icon.unwrap_or(false) {
            None
        } else {
            Some(opts.icon.unwrap_or(IconSource::Bundled))
        };

        Ok(Self {
            src: request.src.clone(),
            dest: request.dest.clone(),
            id,
            product_name: opts.product_name.or_else(|| meta_product_name.clone()),
            generic_name: opts.generic_name.or(meta_generic_name),
            description: opts.description.or_else(|| metadata.description.clone()),
            version: opts
                .version
                .or_else(|| metadata.version.clone())
                .unwrap_or_else(|| FALLBACK_VERSION.to_string()),
            branch: opts.branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            arch,
            base: opts.base.unwrap_or_else(|| DEFAULT_BASE.to_string()),
            base_version: opts
                .base_version
                .unwrap_or_else(|| DEFAULT_BASE_VERSION.to_string()),
            base_flatpakref: opts
                .base_flatpakref
                .unwrap_or_else(|| DEFAULT_BASE_FLATPAKREF.to_string()),
            runtime: opts.runtime.unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
            sdk_version: opts.sdk_version.unwrap_or_else(|| runtime_version.clone()),
            runtime_version,
            runtime_flatpakref: opts
                .runtime_flatpakref
                .unwrap_or_else(|| DEFAULT_RUNTIME_FLATPAKREF.to_string()),
            sdk: opts.sdk.unwrap_or_else(|| DEFAULT_SDK.to_string()),
            sdk_flatpakref: opts
                .sdk_flatpakref
                .unwrap_or_else(|| DEFAULT_SDK_FLATPAKREF.to_string()),
            finish_args: opts
                .finish_args
                .unwrap_or_else(|| DEFAULT_FINISH_ARGS.iter().map(|s| s.to_string()).collect()),
            modules: opts.modules.unwrap_or_default(),
            bin: opts
                .bin
                .or(meta_product_name)
                .unwrap_or_else(|| "electron".to_string()),
            icon,
            files: opts.files.unwrap_or_default(),
            symlinks: opts.symlinks.unwrap_or_default(),
            categories: opts
                .categories
                .unwrap_or_else(|| DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect()),
            mime_type: opts.mime_type.unwrap_or_default(),
            desktop_template: opts.desktop_template,
            extra: opts.extra,
            rename: request.rename.clone().unwrap_or_default(),
        })
    }

    /// Bundle file name: `<id>_<branch>_<arch>.flatpak`.
    pub fn bundle_file_name(&self) -> String {
        format!("{}_{}_{}.flatpak", self.id, self.branch, self.arch)
    }

    /// Where the bundle will be written.
    pub fn bundle_path(&self) -> PathBuf {
        self.rename.apply(&self.dest, &self.bundle_file_name())
    }

    /// Staging directory name: `<id>_<version>_<arch>`.
    pub fn staging_dir_name(&self) -> String {
        format!("{}_{}_{}", self.id, self.version, self.arch)
    }

    /// Absolute in-bundle path of the pixmap icon.
    pub fn pixmap_path(&self) -> PathBuf {
        PathBuf::from("/share/pixmaps").join(format!("{}.png", self.id))
    }
}

/// Flatpak architecture name of the machine running the installer.
pub fn host_arch() -> String {
    match std::env::consts::ARCH {
        "x86" => "i386".to_string(),
        other => other.to_string(),
    }
}

/// Maps Electron, Debian and Flatpak spellings onto Flatpak's architecture names.
pub fn flatpak_arch(arch: &str) -> Result<&'static str> {
    match arch {
        "x86_64" | "amd64" | "x64" => Ok("x86_64"),
        "i386" | "i686" | "ia32" | "x86" => Ok("i386"),
        "aarch64" | "arm64" => Ok("aarch64"),
        "arm" | "armhf" | "armv7l" => Ok("arm"),
        other => Err(Error::ArchError(other.to_string())),
    }
}
