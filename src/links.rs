//! Resolution of listing-page hrefs into absolute article URLs.

use url::Url;

/// Resolve `href` found on a page at `base` into an absolute http(s) URL.
///
/// Returns `None` for hrefs that cannot be navigated to: empty values,
/// fragment-only anchors, `javascript:` pseudo-URLs, and anything that does
/// not end up with an `http` or `https` scheme.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize("https://ex.com/a/", "/b").as_deref(), Some("https://ex.com/b"));
/// assert_eq!(normalize("https://ex.com/a/", "#top"), None);
/// ```
pub fn normalize(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || is_script(href) {
        return None;
    }

    if href.starts_with("//") {
        let scheme = Url::parse(base)
            .ok()
            .map(|b| b.scheme().to_string())
            .unwrap_or_else(|| "https".to_string());
        return navigable(format!("{scheme}:{href}"));
    }

    if href.starts_with('/') {
        return join(base, href);
    }

    match Url::parse(href) {
        Ok(absolute) if is_http(&absolute) => Some(href.to_string()),
        Ok(_) => None,
        Err(_) => join(base, href),
    }
}

fn is_script(href: &str) -> bool {
    href.get(..11)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("javascript:"))
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

fn join(base: &str, href: &str) -> Option<String> {
    let joined = Url::parse(base).ok()?.join(href).ok()?;
    is_http(&joined).then(|| joined.to_string())
}

fn navigable(candidate: String) -> Option<String> {
    let parsed = Url::parse(&candidate).ok()?;
    is_http(&parsed).then_some(candidate)
}
