//! Flatpak bundles for packaged Electron applications.
//!
//! This crate takes the output directory of an Electron packager (the
//! application binary, its resources and a `LICENSE`), stages a Flatpak
//! application tree with a desktop entry, icons and copyright file, and
//! builds a single-file `.flatpak` bundle with the host's flatpak tools.
//!
//! ## Features
//!
//! - **Metadata-driven defaults**: id, names and version come from `package.json`,
//!   read from `resources/app.asar` or `resources/app/`
//! - **Layered options**: defaults < metadata < JSON config < command line
//! - **Concurrent staging**: desktop entry, icons, copyright and application
//!   copy run side by side
//! - **Pluggable bundling**: anything implementing [`bundler::FlatpakBundler`]
//!
//! ## Usage
//!
//! ```bash
//! flatpak_installer --src dist/app-linux-x64 --dest dist/installers --arch x64
//! flatpak_installer --src dist/app-linux-ia32 --dest out --config flatpak.json --keep-temp
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bundler;
pub mod cli;
pub mod error;
pub mod metadata;

// Re-export main types for public API
pub use bundler::{
    BundledArtifact, FlatpakBuilder, FlatpakBundler, InstallOutcome, InstallRequest, Installer,
    InstallerOptions, UserOptions,
};
pub use cli::Args;
pub use error::{CliError, InstallerError, Result};
