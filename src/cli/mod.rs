//! Command line interface for flatpak_installer.
//!
//! Parses flags, runs one packaging request and reports the result.

mod args;
mod output;

pub use args::Args;
pub use output::OutputManager;

use crate::bundler::{FlatpakBuilder, InstallOutcome, Installer};
use crate::error::Result;
use std::path::Path;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute(args).await
}

/// Packages the application described by `args` with the host's flatpak tools.
pub async fn execute(args: Args) -> Result<i32> {
    args.validate()?;

    let output = OutputManager::new(args.verbose, args.quiet);
    let keep_temp = args.keep_temp;
    let request = args.into_request().await?;

    output.info(&format!(
        "Packaging {} into {}",
        request.src.display(),
        request.dest.display()
    ))?;

    let installer = Installer::new(FlatpakBuilder::from_env());
    let outcome = installer.install(request).await?;
    report(&output, &outcome)?;

    let staging_dir = &outcome.artifact.staging_dir;
    if keep_temp {
        output.indent(&format!("Staging directory kept at {}", staging_dir.display()))?;
    } else {
        cleanup_staging(&output, staging_dir).await?;
    }

    Ok(0)
}

fn report(output: &OutputManager, outcome: &InstallOutcome) -> Result<()> {
    let artifact = &outcome.artifact;
    output.success(&format!("Created {}", artifact.path.display()))?;
    output.indent(&format!("id:     {}", outcome.options.id))?;
    output.indent(&format!("size:   {} bytes", artifact.size))?;
    output.indent(&format!("sha256: {}", artifact.checksum))?;
    Ok(())
}

/// Removes the temporary root the staging directory was created in.
async fn cleanup_staging(output: &OutputManager, staging_dir: &Path) -> Result<()> {
    let root = staging_dir.parent().unwrap_or(staging_dir);
    output.verbose(&format!("Removing {}", root.display()))?;

    if let Err(e) = tokio::fs::remove_dir_all(root).await {
        log::warn!("Failed to remove {}: {}", root.display(), e);
        output.warn(&format!(
            "Could not remove staging directory {}: {}",
            root.display(),
            e
        ))?;
    }
    Ok(())
}
