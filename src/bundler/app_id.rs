//! Reverse-DNS application id derivation.

use crate::bundler::error::{Error, Result};

/// Domain used when the package has no usable homepage.
pub const DEFAULT_DOMAIN: &str = "electron.atom.io";

/// Flatpak refuses application ids longer than this.
pub const MAX_APP_ID_LEN: usize = 255;

/// Derives a Flatpak application id from a package name and homepage.
///
/// The homepage host is reversed into a domain prefix (`www.foo.com` becomes
/// `com.foo`) and the package name is appended as the last label. Labels that
/// would make the id exceed [`MAX_APP_ID_LEN`] are dropped from the front.
///
/// ```
/// use flatpak_installer::bundler::derive_app_id;
///
/// assert_eq!(derive_app_id("footest", None).unwrap(), "io.atom.electron.footest");
/// assert_eq!(derive_app_id("bartest", Some("http://foo.com")).unwrap(), "com.foo.bartest");
/// ```
pub fn derive_app_id(name: &str, homepage: Option<&str>) -> Result<String> {
    let host = homepage
        .and_then(|homepage| url::Url::parse(homepage).ok())
        .and_then(|url| url.host_str().map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());

    let mut labels: Vec<&str> = host.split('.').collect();
    if labels.first() == Some(&"www") {
        labels.remove(0);
    }
    labels.reverse();

    let mut parts: Vec<String> = labels.into_iter().map(sanitize_label).collect();
    parts.push(sanitize_label(name));

    let mut app_id = parts.join(".");
    while app_id.len() > MAX_APP_ID_LEN {
        // The name label is never dropped
        if parts.len() <= 1 {
            return Err(Error::AppIdTooLong(app_id));
        }
        parts.remove(0);
        app_id = parts.join(".");
    }

    Ok(app_id)
}

/// Replaces characters outside `[A-Za-z0-9]` with `_` and guards a leading digit.
fn sanitize_label(label: &str) -> String {
    let mut sanitized: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}
