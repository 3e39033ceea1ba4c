//! Error types for flatpak_installer operations.
//!
//! This module defines the top-level error type with actionable error messages and recovery suggestions.

use crate::bundler;
use thiserror::Error;

/// Result type alias for flatpak_installer operations
pub type Result<T> = std::result::Result<T, InstallerError>;

/// Main error type for all flatpak_installer operations
#[derive(Error, Debug)]
pub enum InstallerError {
    /// Packaging errors
    #[error("{0}")]
    Bundler(#[from] bundler::Error),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Conflicting arguments
    #[error("Conflicting arguments: {arguments:?}")]
    ConflictingArguments {
        /// Arguments that conflict
        arguments: Vec<String>,
    },
}

impl InstallerError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            InstallerError::Bundler(error) => bundler_suggestions(error.root()),
            InstallerError::Cli(CliError::InvalidArguments { .. }) => vec![
                "Run with --help to see the accepted arguments".to_string(),
            ],
            InstallerError::Cli(CliError::ConflictingArguments { arguments }) => vec![format!(
                "Pass only one of: {}",
                arguments.join(", ")
            )],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}

fn bundler_suggestions(error: &bundler::Error) -> Vec<String> {
    use bundler::Error;

    match error {
        Error::Metadata(_) | Error::Asar { .. } => vec![
            "Point --src at a packaged Electron application directory".to_string(),
            "Ensure resources/app.asar or resources/app/package.json exists and is valid JSON"
                .to_string(),
        ],
        Error::ToolNotFound(tool) => vec![
            format!("Install {tool} from your distribution's package manager"),
            format!(
                "Or set {} / {} to the tool's location",
                bundler::flatpak::FLATPAK_ENV,
                bundler::flatpak::FLATPAK_BUILDER_ENV
            ),
        ],
        Error::ToolFailed { .. } => vec![
            "Check the tool output above".to_string(),
            "Verify the runtime, SDK and base application can be installed with flatpak install"
                .to_string(),
        ],
        Error::AppIdTooLong(_) => vec![
            "Pass a shorter application id with --id".to_string(),
        ],
        Error::ArchError(_) => vec![
            "Use one of: x86_64 (x64, amd64), i386 (ia32), aarch64 (arm64), arm (armv7l)"
                .to_string(),
        ],
        Error::Template { .. } => vec![
            "Check the desktop template for syntax errors and unknown fields".to_string(),
        ],
        _ => vec!["Check the error message above for specific details".to_string()],
    }
}
