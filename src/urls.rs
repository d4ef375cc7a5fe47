//! URL resolution helpers.

use url::Url;

/// Resolve `href` against `base`, returning `href` unchanged when either
/// side fails to parse.
pub fn absolutize(base: &str, href: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Drop any `#fragment` suffix.
pub fn strip_fragment(url: &str) -> String {
    url.split('#').next().unwrap_or(url).to_string()
}
