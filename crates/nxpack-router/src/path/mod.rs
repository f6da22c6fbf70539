//! Path utilities for route patterns and request paths
//!
//! Used both at build time (locale prefixes on manifest patterns) and at
//! request time by the revalidation resolver, so the two sides agree on how
//! a path is localized. All functions are **pure**.

use std::borrow::Cow;

pub mod hierarchy;
pub use hierarchy::PathHierarchy;

/// Strips exactly one trailing slash, never collapsing the root
///
/// # Examples
///
/// ```
/// use nxpack_router::path::strip_trailing_slash;
///
/// assert_eq!(strip_trailing_slash("/about/"), "/about");
/// assert_eq!(strip_trailing_slash("/about"), "/about");
/// assert_eq!(strip_trailing_slash("/"), "/");
/// assert_eq!(strip_trailing_slash("/a//"), "/a/");
/// ```
pub fn strip_trailing_slash(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some("") | None => path,
        Some(stripped) => stripped,
    }
}

/// Returns the first non-empty segment of a path
///
/// ```
/// use nxpack_router::path::first_segment;
///
/// assert_eq!(first_segment("/fr/about"), Some("fr"));
/// assert_eq!(first_segment("/"), None);
/// ```
pub fn first_segment(path: &str) -> Option<&str> {
    path.split('/').find(|s| !s.is_empty())
}

/// Prefixes a path with a locale segment
///
/// The root path maps to the bare locale (`/fr`), never `/fr/`.
///
/// ```
/// use nxpack_router::path::localize_path;
///
/// assert_eq!(localize_path("/about", "fr"), "/fr/about");
/// assert_eq!(localize_path("/", "fr"), "/fr");
/// ```
pub fn localize_path(path: &str, locale: &str) -> String {
    if path == "/" || path.is_empty() {
        format!("/{}", locale)
    } else {
        format!("/{}{}", locale, path)
    }
}

/// Removes a leading locale segment if the path has one
///
/// Returns `Cow::Borrowed` when the path carries no known locale.
///
/// ```
/// use nxpack_router::path::unlocalize_path;
///
/// let locales = vec!["en".to_string(), "fr".to_string()];
/// assert_eq!(unlocalize_path("/fr/about", &locales), "/about");
/// assert_eq!(unlocalize_path("/fr", &locales), "/");
/// assert_eq!(unlocalize_path("/about", &locales), "/about");
/// ```
pub fn unlocalize_path<'a>(path: &'a str, locales: &[String]) -> Cow<'a, str> {
    match first_segment(path) {
        Some(segment) if locales.iter().any(|l| l == segment) => {
            let rest = &path[path.find(segment).map_or(0, |i| i + segment.len())..];
            if rest.is_empty() || rest == "/" {
                Cow::Borrowed("/")
            } else {
                Cow::Borrowed(rest)
            }
        }
        _ => Cow::Borrowed(path),
    }
}

/// Ensures the path starts with a locale, prefixing `default_locale` if not
///
/// ```
/// use nxpack_router::path::ensure_locale_prefix;
///
/// let locales = vec!["en".to_string(), "fr".to_string()];
/// assert_eq!(ensure_locale_prefix("/about", "en", &locales), "/en/about");
/// assert_eq!(ensure_locale_prefix("/fr/about", "en", &locales), "/fr/about");
/// ```
pub fn ensure_locale_prefix<'a>(
    path: &'a str,
    default_locale: &str,
    locales: &[String],
) -> Cow<'a, str> {
    match first_segment(path) {
        Some(segment) if locales.iter().any(|l| l == segment) => Cow::Borrowed(path),
        _ => Cow::Owned(localize_path(path, default_locale)),
    }
}

/// Prepends the deployment base path to a rule source or target
///
/// ```
/// use nxpack_router::path::with_base_path;
///
/// assert_eq!(with_base_path("", "/about"), "/about");
/// assert_eq!(with_base_path("/docs", "/about"), "/docs/about");
/// assert_eq!(with_base_path("/docs", "/"), "/docs/");
/// ```
pub fn with_base_path(base_path: &str, path: &str) -> String {
    format!("{}{}", base_path.trim_end_matches('/'), path)
}
