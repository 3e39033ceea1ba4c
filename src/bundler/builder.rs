//! Packaging pipeline orchestration.
//!
//! The [`Installer`] runs one packaging request end to end:
//! 1. Reads `package.json` from the application
//! 2. Resolves [`InstallerOptions`] (explicit > metadata > defaults)
//! 3. Creates a staging directory and fills it concurrently
//! 4. Hands the staged tree to a [`FlatpakBundler`]
//! 5. Returns the [`BundledArtifact`] with its size and checksum
//!
//! # Example
//!
//! ```no_run
//! use flatpak_installer::bundler::{FlatpakBuilder, InstallRequest, Installer, UserOptions};
//!
//! # async fn example() -> flatpak_installer::bundler::Result<()> {
//! let installer = Installer::new(FlatpakBuilder::from_env());
//! let outcome = installer
//!     .install(InstallRequest {
//!         src: "dist/app-linux-x64".into(),
//!         dest: "dist/installers".into(),
//!         options: UserOptions {
//!             arch: Some("x64".into()),
//!             ..Default::default()
//!         },
//!         rename: None,
//!     })
//!     .await?;
//!
//! println!("Created {} ({} bytes)", outcome.artifact.path.display(), outcome.artifact.size);
//! # Ok(())
//! # }
//! ```

use crate::bundler::error::{Context, ErrorExt, Result};
use crate::bundler::flatpak::{BundleOptions, BundleSpec, FlatpakBundler};
use crate::bundler::settings::{InstallRequest, InstallerOptions};
use crate::bundler::staging::{create_contents, create_staging_dir};
use crate::bundler::{BundledArtifact, InstallOutcome};
use crate::metadata::read_metadata;
use std::path::{Path, PathBuf};

/// Packaging pipeline over a bundler implementation.
#[derive(Debug, Clone)]
pub struct Installer<B> {
    bundler: B,
}

impl<B: FlatpakBundler> Installer<B> {
    /// Creates an installer that builds bundles with `bundler`.
    pub fn new(bundler: B) -> Self {
        Self { bundler }
    }

    /// Packages the application described by `request`.
    ///
    /// Fails fast: the first failing stage aborts the run. A staging
    /// directory that was already created is left on disk.
    pub async fn install(&self, request: InstallRequest) -> Result<InstallOutcome> {
        match self.run(&request).await {
            Ok(outcome) => {
                log::info!(
                    "Successfully created package at {}",
                    outcome.artifact.path.display()
                );
                Ok(outcome)
            }
            Err(e) => {
                log::error!("Error creating package: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, request: &InstallRequest) -> Result<InstallOutcome> {
        let metadata = read_metadata(&request.src).await?;
        let options = InstallerOptions::resolve(request, &metadata)?;
        log::debug!(
            "Creating package with options\n{}",
            serde_json::to_string_pretty(&options)?
        );

        let staging_dir = create_staging_dir(&options).await?;
        create_contents(&options, &staging_dir).await?;
        let path = self.create_bundle(&options, &staging_dir).await?;

        let size = tokio::fs::metadata(&path)
            .await
            .fs_context("reading bundle metadata", &path)?
            .len();
        let checksum = calculate_sha256(&path).await?;

        Ok(InstallOutcome {
            options,
            artifact: BundledArtifact {
                path,
                size,
                checksum,
                staging_dir,
            },
        })
    }

    async fn create_bundle(&self, options: &InstallerOptions, staging_dir: &Path) -> Result<PathBuf> {
        let spec = BundleSpec::from_options(options, staging_dir);
        let bundle_options = BundleOptions::from_options(options)?;
        log::info!("Creating package at {}", bundle_options.bundle_path.display());

        self.bundler
            .bundle(&spec, &bundle_options)
            .await
            .context("Error creating bundle")
    }
}

/// Calculates the hex-encoded SHA-256 of a file.
///
/// Reads in 8KB chunks.
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for hashing", path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hash calculation", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
