//! Error types for packaging operations.
//!
//! Every stage of the pipeline reports through [`Error`]. Stage boundaries wrap
//! the underlying failure with [`Context`] so the final message reads like
//! `Error creating icon file: copying icon /tmp/x.png: No such file or directory`.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use flatpak_installer::bundler::{Context, ErrorExt, Result};
//!
//! fn read_manifest(path: &Path) -> Result<String> {
//!     let manifest = std::fs::read_to_string(path)
//!         .fs_context("reading flatpak manifest", path)
//!         .context("Error reading manifest")?;
//!     Ok(manifest)
//! }
//! ```

use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
    process::ExitStatus,
};
use thiserror::Error as DeriveError;

/// Errors returned by the installer pipeline.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// A stage label wrapped around the underlying failure.
    ///
    /// Produced by [`Context::context`].
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// I/O failure on a known path. Produced by [`ErrorExt::fs_context`].
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "copying icon")
        context: &'static str,
        /// File or directory involved
        path: PathBuf,
        /// Source error
        error: io::Error,
    },

    /// A child process could not be spawned.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command line that could not be spawned
        command: String,
        /// Spawn error
        error: io::Error,
    },

    /// A child process ran but exited unsuccessfully.
    #[error("{command} exited with {status}: {stderr}")]
    ToolFailed {
        /// Command line that was run
        command: String,
        /// Exit status reported by the process
        status: ExitStatus,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// Required external tool is not installed.
    #[error("required tool `{0}` was not found in PATH")]
    ToolNotFound(String),

    /// Application metadata could not be read or parsed.
    #[error("Error reading package metadata: {0}")]
    Metadata(String),

    /// Asar archive is malformed or the requested entry is missing.
    #[error("invalid asar archive {path}: {reason}")]
    Asar {
        /// Archive that was being read
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Template could not be read or rendered.
    #[error("Error rendering template {path}: {reason}")]
    Template {
        /// Template file, or a label for the builtin template
        path: String,
        /// Underlying handlebars failure
        reason: String,
    },

    /// The derived application id cannot be made short enough.
    #[error("application id `{0}` exceeds 255 characters even after trimming its domain")]
    AppIdTooLong(String),

    /// Architecture name with no Flatpak equivalent.
    #[error("unsupported architecture: {0}")]
    ArchError(String),

    /// I/O failure without path information.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Directory traversal failure while copying the application.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// A walked path was not under the copy root.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// Malformed JSON (config, manifest, metadata).
    #[error("{0}")]
    JsonError(#[from] serde_json::error::Error),

    /// Free-form failure, usually from [`bail!`](crate::bail).
    #[error("{0}")]
    GenericError(String),
}

/// Result alias used across the bundler.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the innermost error beneath any [`Error::Context`] layers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context(_, inner) => inner.root(),
            other => other,
        }
    }
}

/// Labels a failure with the stage it happened in, wrapping it into
/// [`Error::Context`].
pub trait Context<T> {
    /// Wraps the error with `context`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Like [`Context::context`], building the label only on failure.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

/// Attaches the operation and path to I/O errors.
pub trait ErrorExt<T> {
    /// Converts an I/O error into [`Error::Fs`].
    ///
    /// `context` is a verb phrase such as "reading license file".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Returns early with an [`Error::GenericError`].
///
/// ```ignore
/// bail!("no flatpakref for {}", runtime);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
