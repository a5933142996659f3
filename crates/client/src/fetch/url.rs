//! Origin parsing and asset path resolution.

use url::{ParseError, Url};

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("cross-origin target: {0}")]
    CrossOrigin(String),
}

/// Parse the site origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Require http or https
/// 4. Remove fragment (#...)
///
/// Relative asset paths resolve against the result, so an origin with a
/// path prefix should end in `/` (`https://host/app/`).
pub fn parse_origin(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    check_scheme(&parsed)?;
    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a manifest path against `origin`.
///
/// Input that parses as an absolute URL is taken as-is; anything else is
/// joined onto the origin, so `/style.css` and `assets/logo.png` both land
/// under it. The result must stay on the origin, which rules out
/// scheme-relative paths (`//other.host/x`) and foreign absolute URLs.
/// The query string is kept and the fragment dropped.
pub fn resolve_asset(origin: &Url, path: &str) -> Result<Url, UrlError> {
    let trimmed = path.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => {
            origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
        }
        Err(e) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    check_scheme(&resolved)?;
    if resolved.origin() != origin.origin() {
        return Err(UrlError::CrossOrigin(resolved.origin().ascii_serialization()));
    }
    resolved.set_fragment(None);

    Ok(resolved)
}

/// Map an intercepted request target (`/path?query`) onto `origin`.
///
/// The target is never parsed as a URL: its path is appended to the
/// origin's path prefix and its query copied verbatim, so the host always
/// stays the origin's.
pub fn resolve_target(origin: &Url, target: &str) -> Result<Url, UrlError> {
    let target = target.split('#').next().unwrap_or_default();

    if target.is_empty() {
        return Err(UrlError::Empty);
    }
    if !target.starts_with('/') {
        return Err(UrlError::InvalidUrl(format!("request target must start with '/': {target}")));
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    let mut resolved = origin.clone();
    let prefix = origin.path().trim_end_matches('/');
    resolved.set_path(&format!("{prefix}{path}"));
    resolved.set_query(query);
    resolved.set_fragment(None);

    Ok(resolved)
}

fn check_scheme(url: &Url) -> Result<(), UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}
