//! Electron application to Flatpak bundle packaging.
//!
//! Given the directory of a packaged Electron application, this module
//! stages a filesystem tree laid out the way Flatpak installs applications
//! under `/app` and hands it to a Flatpak bundler, producing a single
//! `.flatpak` file.
//!
//! # Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Metadata | [`crate::metadata`] | `package.json` fields |
//! | Options | [`settings`] | [`InstallerOptions`] |
//! | Staging | [`staging`] | desktop entry, icons, copyright, application |
//! | Bundling | [`flatpak`] | `<id>_<branch>_<arch>.flatpak` |
//!
//! # Example
//!
//! ```no_run
//! use flatpak_installer::bundler::{FlatpakBuilder, InstallRequest, Installer};
//!
//! # async fn example() -> flatpak_installer::bundler::Result<()> {
//! let outcome = Installer::new(FlatpakBuilder::from_env())
//!     .install(InstallRequest {
//!         src: "dist/app-linux-x64".into(),
//!         dest: "dist/installers".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("SHA256: {}", outcome.artifact.checksum);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod app_id;
mod builder;
mod error;
pub mod flatpak;
pub mod settings;
pub mod staging;
pub mod template;
pub(crate) mod utils;

// Public re-exports
pub use app_id::derive_app_id;
pub use builder::{Installer, calculate_sha256};
pub use error::{Context, Error, ErrorExt, Result};
pub use flatpak::{BundleOptions, BundleSpec, FlatpakBuilder, FlatpakBundler, ToolConfig};
pub use settings::{IconSource, InstallRequest, InstallerOptions, Rename, UserOptions};

use std::path::PathBuf;

/// A created bundle and what is known about it.
///
/// # Examples
///
/// ```no_run
/// use flatpak_installer::bundler::{FlatpakBuilder, InstallRequest, Installer};
///
/// # async fn example() -> flatpak_installer::bundler::Result<()> {
/// # let request = InstallRequest::default();
/// let outcome = Installer::new(FlatpakBuilder::from_env()).install(request).await?;
/// let artifact = outcome.artifact;
/// println!("Created {}: {} bytes", artifact.path.display(), artifact.size);
/// println!("SHA256: {}", artifact.checksum);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BundledArtifact {
    /// Path of the `.flatpak` file.
    pub path: PathBuf,

    /// Size of the bundle in bytes.
    pub size: u64,

    /// SHA-256 checksum of the bundle, hex encoded.
    pub checksum: String,

    /// Staging directory the bundle was built from.
    ///
    /// It is not removed by the installer.
    pub staging_dir: PathBuf,
}

/// Result of a successful packaging run.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// The options the run resolved to.
    pub options: InstallerOptions,
    /// The created bundle.
    pub artifact: BundledArtifact,
}
