//! Handlebars rendering of text templates against the resolved options.

use crate::bundler::error::{Error, Result};
use crate::bundler::settings::InstallerOptions;
use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;

/// Desktop entry template used unless `desktop_template` is set.
pub const DESKTOP_TEMPLATE: &str = include_str!("../../resources/desktop.hbs");

const BUILTIN_DESKTOP_LABEL: &str = "<builtin desktop template>";

/// Renders `template` against `data`.
///
/// Rendering is strict: referencing a key that `data` does not provide is an
/// error. Output is not HTML-escaped. `label` names the template in errors.
pub fn render_template<T: Serialize>(label: &str, template: &str, data: &T) -> Result<String> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);

    let failed = |reason: String| Error::Template {
        path: label.to_string(),
        reason,
    };

    registry
        .register_template_string(label, template)
        .map_err(|e| failed(e.to_string()))?;
    registry.render(label, data).map_err(|e| failed(e.to_string()))
}

/// Reads the template at `path` and renders it against `data`.
pub async fn render_template_file<T: Serialize>(path: &Path, data: &T) -> Result<String> {
    log::debug!("Generating template from {}", path.display());

    let template = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Template {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    let rendered = render_template(&path.display().to_string(), &template, data)?;

    log::debug!("Generated template from {}\n{}", path.display(), rendered);
    Ok(rendered)
}

/// Renders the desktop entry for `options`.
pub async fn render_desktop_entry(options: &InstallerOptions) -> Result<String> {
    match &options.desktop_template {
        Some(path) => render_template_file(path, options).await,
        None => {
            let rendered = render_template(BUILTIN_DESKTOP_LABEL, DESKTOP_TEMPLATE, options)?;
            log::debug!("Generated desktop entry\n{}", rendered);
            Ok(rendered)
        }
    }
}
