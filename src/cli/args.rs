//! Command line argument parsing and validation.
//!
//! Every packaging option has a flag. Flags override values loaded from
//! `--config`, which in turn override what is read from the application's
//! `package.json`.

use crate::bundler::{IconSource, InstallRequest, UserOptions};
use crate::error::{CliError, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Create a Flatpak bundle from a packaged Electron application
#[derive(Parser, Debug)]
#[command(
    name = "flatpak_installer",
    version,
    about = "Create a Flatpak bundle from a packaged Electron application",
    long_about = "Create a Flatpak bundle from a packaged Electron application.

Usage:
  flatpak_installer --src dist/app-linux-x64 --dest dist/installers --arch x64
  flatpak_installer --src dist/app-linux-ia32 --dest out --config flatpak.json

The flatpak and flatpak-builder tools are looked up in PATH unless
FLATPAK_INSTALLER_FLATPAK or FLATPAK_INSTALLER_FLATPAK_BUILDER is set."
)]
pub struct Args {
    /// Directory of the packaged application
    #[arg(long, value_name = "DIR")]
    pub src: PathBuf,

    /// Directory the bundle is written to
    #[arg(long, value_name = "DIR")]
    pub dest: PathBuf,

    /// JSON file with packaging options (camelCase keys)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Application id, e.g. com.example.App
    #[arg(long)]
    pub id: Option<String>,

    /// Application name shown to users
    #[arg(long)]
    pub product_name: Option<String>,

    /// Generic name, e.g. "Text Editor"
    #[arg(long)]
    pub generic_name: Option<String>,

    /// Short description (desktop file Comment)
    #[arg(long)]
    pub description: Option<String>,

    /// Flatpak branch
    #[arg(long)]
    pub branch: Option<String>,

    /// Target architecture (x64, ia32, arm64, armv7l or a Flatpak arch name)
    #[arg(long)]
    pub arch: Option<String>,

    /// Base application
    #[arg(long)]
    pub base: Option<String>,

    /// Base application branch
    #[arg(long)]
    pub base_version: Option<String>,

    /// Where to install the base application from
    #[arg(long, value_name = "URL")]
    pub base_flatpakref: Option<String>,

    /// Runtime
    #[arg(long)]
    pub runtime: Option<String>,

    /// Runtime branch
    #[arg(long)]
    pub runtime_version: Option<String>,

    /// Where to install the runtime from
    #[arg(long, value_name = "URL")]
    pub runtime_flatpakref: Option<String>,

    /// SDK
    #[arg(long)]
    pub sdk: Option<String>,

    /// SDK branch (defaults to the runtime branch)
    #[arg(long)]
    pub sdk_version: Option<String>,

    /// Where to install the SDK from
    #[arg(long, value_name = "URL")]
    pub sdk_flatpakref: Option<String>,

    /// Sandbox permission passed to flatpak build-finish (repeatable, replaces the defaults)
    #[arg(long = "finish-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub finish_args: Vec<String>,

    /// Executable inside the application directory
    #[arg(long)]
    pub bin: Option<String>,

    /// PNG icon installed as a pixmap
    #[arg(long, value_name = "FILE")]
    pub icon: Option<PathBuf>,

    /// PNG icon for one resolution, as RES=FILE (repeatable)
    #[arg(long = "hicolor-icon", value_name = "RES=FILE")]
    pub hicolor_icons: Vec<String>,

    /// Do not install any icon
    #[arg(long)]
    pub no_icon: bool,

    /// Desktop entry category (repeatable)
    #[arg(long = "category", value_name = "CATEGORY")]
    pub categories: Vec<String>,

    /// MIME type handled by the application (repeatable)
    #[arg(long = "mime-type", value_name = "TYPE")]
    pub mime_types: Vec<String>,

    /// Handlebars template for the desktop entry
    #[arg(long, value_name = "FILE")]
    pub desktop_template: Option<PathBuf>,

    /// Keep the staging directory after the bundle is created
    #[arg(long)]
    pub keep_temp: bool,

    /// Show detailed output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<()> {
        let icon_flags: Vec<String> = [
            (self.icon.is_some(), "--icon"),
            (!self.hicolor_icons.is_empty(), "--hicolor-icon"),
            (self.no_icon, "--no-icon"),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .map(|(_, flag)| flag.to_string())
        .collect();

        if icon_flags.len() > 1 {
            return Err(CliError::ConflictingArguments {
                arguments: icon_flags,
            }
            .into());
        }
        Ok(())
    }

    /// Options given as flags. Unset flags stay `None`.
    pub fn user_options(&self) -> Result<UserOptions> {
        let icon = if !self.hicolor_icons.is_empty() {
            Some(IconSource::Hicolor(parse_hicolor_icons(&self.hicolor_icons)?))
        } else {
            self.icon.clone().map(IconSource::Pixmap)
        };

        Ok(UserOptions {
            id: self.id.clone(),
            product_name: self.product_name.clone(),
            generic_name: self.generic_name.clone(),
            description: self.description.clone(),
            branch: self.branch.clone(),
            arch: self.arch.clone(),
            base: self.base.clone(),
            base_version: self.base_version.clone(),
            base_flatpakref: self.base_flatpakref.clone(),
            runtime: self.runtime.clone(),
            runtime_version: self.runtime_version.clone(),
            runtime_flatpakref: self.runtime_flatpakref.clone(),
            sdk: self.sdk.clone(),
            sdk_version: self.sdk_version.clone(),
            sdk_flatpakref: self.sdk_flatpakref.clone(),
            finish_args: non_empty(&self.finish_args),
            bin: self.bin.clone(),
            icon,
            no_icon: self.no_icon.then_some(true),
            categories: non_empty(&self.categories),
            mime_type: non_empty(&self.mime_types),
            desktop_template: self.desktop_template.clone(),
            ..Default::default()
        })
    }

    /// Builds the packaging request, layering flags over `--config`.
    pub async fn into_request(self) -> Result<InstallRequest> {
        let flags = self.user_options()?;
        let options = match &self.config {
            Some(path) => UserOptions::from_json_file(path).await?.overlay(flags),
            None => flags,
        };

        Ok(InstallRequest {
            src: self.src,
            dest: self.dest,
            options,
            rename: None,
        })
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

fn parse_hicolor_icons(values: &[String]) -> Result<BTreeMap<String, PathBuf>> {
    values
        .iter()
        .map(|value| match value.split_once('=') {
            Some((res, path)) if !res.is_empty() && !path.is_empty() => {
                Ok((res.to_string(), PathBuf::from(path)))
            }
            _ => Err(CliError::InvalidArguments {
                reason: format!("--hicolor-icon expects RES=FILE, got `{value}`"),
            }
            .into()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallerError;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["flatpak_installer", "--src", "app", "--dest", "out"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_unset_flags_stay_unset() {
        let options = parse(&[]).user_options().unwrap();
        assert_eq!(options, UserOptions::default());
    }

    #[test]
    fn test_repeatable_flags() {
        let args = parse(&[
            "--finish-arg",
            "--socket=x11",
            "--finish-arg=--share=network",
            "--category",
            "Development",
            "--mime-type",
            "text/plain",
        ]);
        let options = args.user_options().unwrap();

        assert_eq!(
            options.finish_args,
            Some(vec!["--socket=x11".to_string(), "--share=network".to_string()])
        );
        assert_eq!(options.categories, Some(vec!["Development".to_string()]));
        assert_eq!(options.mime_type, Some(vec!["text/plain".to_string()]));
    }

    #[test]
    fn test_hicolor_icons() {
        let args = parse(&[
            "--hicolor-icon",
            "16x16=small.png",
            "--hicolor-icon",
            "512x512=big.png",
        ]);
        match args.user_options().unwrap().icon {
            Some(IconSource::Hicolor(icons)) => {
                assert_eq!(icons["16x16"], PathBuf::from("small.png"));
                assert_eq!(icons["512x512"], PathBuf::from("big.png"));
            }
            other => panic!("unexpected icon: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_hicolor_icon() {
        let err = parse(&["--hicolor-icon", "big.png"]).user_options().unwrap_err();
        assert!(matches!(
            err,
            InstallerError::Cli(CliError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_icon_flags_conflict() {
        let err = parse(&["--icon", "a.png", "--no-icon"]).validate().unwrap_err();
        match err {
            InstallerError::Cli(CliError::ConflictingArguments { arguments }) => {
                assert_eq!(arguments, vec!["--icon", "--no-icon"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_flags_override_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("flatpak.json");
        std::fs::write(&config, r#"{"branch":"stable","arch":"i386"}"#).unwrap();

        let args = parse(&["--config", config.to_str().unwrap(), "--arch", "x64"]);
        let request = args.into_request().await.unwrap();

        assert_eq!(request.src, PathBuf::from("app"));
        assert_eq!(request.options.branch.as_deref(), Some("stable"));
        assert_eq!(request.options.arch.as_deref(), Some("x64"));
    }

    #[tokio::test]
    async fn test_icon_flag_overrides_no_icon_in_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("flatpak.json");
        std::fs::write(&config, r#"{"noIcon":true,"section":"devel"}"#).unwrap();

        let args = parse(&["--config", config.to_str().unwrap(), "--icon", "flag.png"]);
        let request = args.into_request().await.unwrap();

        assert_eq!(request.options.icon, Some(IconSource::Pixmap("flag.png".into())));
        assert_eq!(request.options.no_icon, None);
        assert_eq!(request.options.extra["section"], "devel");
    }
}
