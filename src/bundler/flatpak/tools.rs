//! [`FlatpakBundler`] backed by the `flatpak` and `flatpak-builder` CLIs.

use super::{BundleOptions, BundleSpec, FlatpakBundler};
use crate::bundler::error::{Context, Error, ErrorExt, Result};
use crate::bundler::utils::fs::{copy_file, copy_path, join_rooted, symlink_file};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// Environment variable overriding the `flatpak` executable.
pub const FLATPAK_ENV: &str = "FLATPAK_INSTALLER_FLATPAK";

/// Environment variable overriding the `flatpak-builder` executable.
pub const FLATPAK_BUILDER_ENV: &str = "FLATPAK_INSTALLER_FLATPAK_BUILDER";

/// Locations of the external tools.
///
/// `None` means "look it up in `PATH` when needed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolConfig {
    /// `flatpak` executable
    pub flatpak: Option<PathBuf>,
    /// `flatpak-builder` executable, only needed when modules are built
    pub flatpak_builder: Option<PathBuf>,
}

impl ToolConfig {
    /// Reads tool overrides from the environment.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            flatpak: var(FLATPAK_ENV),
            flatpak_builder: var(FLATPAK_BUILDER_ENV),
        }
    }
}

/// Builds bundles by running `flatpak build-init`, `build-finish`,
/// `build-export` and `build-bundle` (or `flatpak-builder` when the manifest
/// carries modules).
#[derive(Debug, Clone, Default)]
pub struct FlatpakBuilder {
    tools: ToolConfig,
}

impl FlatpakBuilder {
    /// Creates a bundler using the given tool locations.
    pub fn new(tools: ToolConfig) -> Self {
        Self { tools }
    }

    /// Creates a bundler configured from the environment.
    pub fn from_env() -> Self {
        Self::new(ToolConfig::from_env())
    }

    fn resolve(configured: &Option<PathBuf>, name: &str) -> Result<PathBuf> {
        match configured {
            Some(path) => Ok(path.clone()),
            None => which::which(name).map_err(|_| Error::ToolNotFound(name.to_string())),
        }
    }

    async fn build(&self, spec: &BundleSpec, options: &BundleOptions) -> Result<PathBuf> {
        let flatpak = Self::resolve(&self.tools.flatpak, "flatpak")?;
        let arch = format!("--arch={}", options.arch);

        for (name, version, flatpakref) in [
            (&spec.runtime, &spec.runtime_version, &spec.runtime_flatpakref),
            (&spec.sdk, &spec.sdk_version, &spec.sdk_flatpakref),
            (&spec.base, &spec.base_version, &spec.base_flatpakref),
        ] {
            if !name.is_empty() {
                ensure_installed(&flatpak, &arch, name, version, flatpakref).await?;
            }
        }

        let work = tempfile::Builder::new()
            .prefix("flatpak-bundler-")
            .tempdir()
            .fs_context("creating bundler work directory", std::env::temp_dir())?;
        let build_dir = work.path().join("build");
        let repo_dir = work.path().join("repo");
        let files_dir = build_dir.join("files");

        if spec.modules.is_empty() {
            let mut init = Command::new(&flatpak);
            init.arg("build-init").arg(&arch);
            if !spec.base.is_empty() {
                init.arg(format!("--base={}", spec.base))
                    .arg(format!("--base-version={}", spec.base_version));
            }
            init.arg(&build_dir)
                .args([&spec.id, &spec.sdk, &spec.runtime, &spec.runtime_version]);
            run(&mut init).await?;
        } else {
            let flatpak_builder = Self::resolve(&self.tools.flatpak_builder, "flatpak-builder")?;
            let manifest_path = work.path().join(format!("{}.json", spec.id));
            tokio::fs::write(&manifest_path, serde_json::to_vec_pretty(&builder_manifest(spec))?)
                .await
                .fs_context("writing flatpak-builder manifest", &manifest_path)?;

            run(Command::new(flatpak_builder)
                .arg(&arch)
                .args(["--build-only", "--force-clean"])
                .arg(&build_dir)
                .arg(&manifest_path))
            .await?;
        }

        for (src, dest) in &spec.files {
            let target = join_rooted(&files_dir, dest);
            log::debug!("Copying {} to {}", src.display(), target.display());
            copy_path(src, &target)
                .await
                .with_context(|| format!("copying {} into bundle", src.display()))?;
        }

        for (target, link) in &spec.symlinks {
            create_symlink(&files_dir, target, link).await?;
        }

        let mut finish = Command::new(&flatpak);
        finish
            .arg("build-finish")
            .arg(&build_dir)
            .arg(format!("--command={}", spec.command))
            .args(&spec.finish_args);
        run(&mut finish).await?;

        for export in &spec.extra_exports {
            let from = join_rooted(&files_dir, export);
            let to = join_rooted(&build_dir.join("export"), export);
            copy_file(&from, &to)
                .await
                .with_context(|| format!("exporting {}", export.display()))?;
        }

        run(Command::new(&flatpak)
            .arg("build-export")
            .arg(&arch)
            .arg(&repo_dir)
            .arg(&build_dir)
            .arg(&spec.branch))
        .await?;

        if let Some(parent) = options.bundle_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating output directory", parent)?;
        }

        run(Command::new(&flatpak)
            .arg("build-bundle")
            .arg(&arch)
            .arg(&repo_dir)
            .arg(&options.bundle_path)
            .arg(&spec.id)
            .arg(&spec.branch))
        .await?;

        Ok(options.bundle_path.clone())
    }
}

impl FlatpakBundler for FlatpakBuilder {
    async fn bundle(&self, spec: &BundleSpec, options: &BundleOptions) -> Result<PathBuf> {
        log::info!(
            "Building {} ({}) with flatpak into {}",
            spec.id,
            options.arch,
            options.bundle_path.display()
        );
        self.build(spec, options).await
    }
}

/// Installs `name//version` from `flatpakref` unless it is already present.
async fn ensure_installed(
    flatpak: &Path,
    arch: &str,
    name: &str,
    version: &str,
    flatpakref: &str,
) -> Result<()> {
    let installed = Command::new(flatpak)
        .args(["info", arch, name, version])
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false);

    if installed {
        log::debug!("{name}//{version} is already installed");
        return Ok(());
    }
    if flatpakref.is_empty() {
        crate::bail!(
            "{}//{} is not installed and no flatpakref was given",
            name,
            version
        );
    }

    log::info!("Installing {name}//{version} from {flatpakref}");
    run(Command::new(flatpak)
        .args(["install", "--user", "--noninteractive", "-y", arch, "--from", flatpakref]))
    .await
    .with_context(|| format!("installing {name}//{version}"))?;
    Ok(())
}

/// Creates `link` pointing at `target`, both interpreted inside `/app`.
async fn create_symlink(files_dir: &Path, target: &Path, link: &Path) -> Result<()> {
    let link_path = join_rooted(files_dir, link);
    let target = if target.is_absolute() {
        join_rooted(Path::new("/app"), target)
    } else {
        target.to_path_buf()
    };

    if let Some(parent) = link_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .fs_context("creating symlink directory", parent)?;
    }
    log::debug!("Linking {} -> {}", link_path.display(), target.display());
    symlink_file(&target, &link_path).fs_context("creating symlink", &link_path)
}

/// Manifest consumed by `flatpak-builder --build-only`.
fn builder_manifest(spec: &BundleSpec) -> serde_json::Value {
    let mut manifest = serde_json::json!({
        "app-id": spec.id,
        "branch": spec.branch,
        "runtime": spec.runtime,
        "runtime-version": spec.runtime_version,
        "sdk": spec.sdk,
        "command": spec.command,
        "finish-args": spec.finish_args,
        "modules": spec.modules,
    });
    if !spec.base.is_empty() {
        manifest["base"] = spec.base.clone().into();
        manifest["base-version"] = spec.base_version.clone().into();
    }
    manifest
}

/// Runs `command`, failing with its stderr when it exits unsuccessfully.
async fn run(command: &mut Command) -> Result<Output> {
    let display = describe(command);
    log::debug!("Running {display}");

    let output = command.output().await.map_err(|error| Error::CommandFailed {
        command: display.clone(),
        error,
    })?;

    if !output.status.success() {
        return Err(Error::ToolFailed {
            command: display,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

fn describe(command: &Command) -> String {
    let std = command.as_std();
    std::iter::once(std.get_program().to_os_string())
        .chain(std.get_args().map(OsString::from))
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spec() -> BundleSpec {
        BundleSpec {
            id: "com.foo.bartest".into(),
            branch: "master".into(),
            base: "io.atom.electron.BaseApp".into(),
            base_version: "master".into(),
            base_flatpakref: String::new(),
            runtime: "org.freedesktop.Platform".into(),
            runtime_version: "1.4".into(),
            runtime_flatpakref: String::new(),
            sdk: "org.freedesktop.Sdk".into(),
            sdk_version: "1.4".into(),
            sdk_flatpakref: String::new(),
            finish_args: vec!["--share=network".into()],
            command: "bartest".into(),
            files: vec![],
            symlinks: vec![],
            extra_exports: vec![],
            modules: vec![serde_json::json!({ "name": "extra" })],
        }
    }

    #[test]
    fn test_builder_manifest_fields() {
        let manifest = builder_manifest(&spec());
        assert_eq!(manifest["app-id"], "com.foo.bartest");
        assert_eq!(manifest["runtime-version"], "1.4");
        assert_eq!(manifest["base"], "io.atom.electron.BaseApp");
        assert_eq!(manifest["modules"][0]["name"], "extra");
    }

    #[test]
    fn test_missing_tool_reported_by_name() {
        let err = FlatpakBuilder::resolve(&None, "definitely-not-a-flatpak-tool").unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(ref name) if name == "definitely-not-a-flatpak-tool"));
    }

    #[test]
    fn test_describe_command() {
        let mut command = Command::new("flatpak");
        command.args(["build-export", "--arch=i386"]);
        assert_eq!(describe(&command), "flatpak build-export --arch=i386");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_targets_are_rooted_in_app() {
        let dir = TempDir::new().unwrap();
        create_symlink(
            dir.path(),
            Path::new("/lib/com.foo.bartest/bartest"),
            Path::new("/bin/bartest"),
        )
        .await
        .unwrap();

        let target = std::fs::read_link(dir.path().join("bin/bartest")).unwrap();
        assert_eq!(target, Path::new("/app/lib/com.foo.bartest/bartest"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_surfaces_stderr() {
        let err = run(Command::new("sh").args(["-c", "echo boom >&2; exit 3"]))
            .await
            .unwrap_err();
        match err {
            Error::ToolFailed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
