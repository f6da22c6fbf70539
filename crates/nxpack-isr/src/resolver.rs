//! Request path → cached artifacts to invalidate
//!
//! The inverse of build-time classification: given a path that was served
//! from the on-demand builder, find the page and data artifacts it produced.

use std::sync::Arc;

use nxpack_router::manifest::{localize_data_route, Fallback, LocaleConfig};
use nxpack_router::path::{
    ensure_locale_prefix, first_segment, strip_trailing_slash, unlocalize_path,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::error::ResolveError;
use crate::manifest::{DynamicEntry, RevalidationManifest};

/// `[id]`, `[...slug]` or `[[...slug]]` in a data route template
static PARAM_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[?(?:\.\.\.)?[^\]/]+\]\]?").expect("static regex"));

const DATA_PREFIX: &str = "/_next/data/";

#[derive(Debug, Clone)]
pub struct RevalidationResolver {
    manifest: Arc<RevalidationManifest>,
    locale: Option<LocaleConfig>,
}

/// Fills `[param]` tokens left to right with the regex's capture groups
fn substitute_params(template: &str, captures: &Captures<'_>) -> String {
    let mut groups = captures.iter().skip(1);
    let filled = PARAM_TOKEN.replace_all(template, |_: &Captures<'_>| {
        groups
            .next()
            .flatten()
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    collapse_empty_catch_all(filled.into_owned())
}

/// An empty optional catch-all leaves `/.json` behind: the base page's data
/// route is `<parent>.json`, or `index.json` directly under the build id.
fn collapse_empty_catch_all(data: String) -> String {
    let Some(parent) = data.strip_suffix("/.json") else {
        return data;
    };
    let directly_under_build_id = parent
        .strip_prefix(DATA_PREFIX)
        .is_some_and(|rest| !rest.contains('/'));
    if directly_under_build_id {
        format!("{}/index.json", parent)
    } else {
        format!("{}.json", parent)
    }
}

impl RevalidationResolver {
    pub fn new(manifest: Arc<RevalidationManifest>, locale: Option<LocaleConfig>) -> Self {
        Self { manifest, locale }
    }

    pub fn manifest(&self) -> &RevalidationManifest {
        &self.manifest
    }

    /// Paths to invalidate for `path`: the page itself, then its data route
    ///
    /// Lookups use `path` without its trailing slash. A direct static match
    /// or a dynamic match reports that normalized key as the page path; a
    /// match through the default-locale prefix reports `path` exactly as
    /// given.
    ///
    /// Fails when no prerendered route or revalidatable dynamic route
    /// covers the path; callers must not treat that as success.
    pub fn paths_for(&self, path: &str) -> Result<Vec<String>, ResolveError> {
        let normalized = strip_trailing_slash(path);

        if let Some(data) = self.manifest.static_data_route(normalized) {
            return Ok(vec![normalized.to_string(), data.to_string()]);
        }

        if let Some(locale) = &self.locale {
            let default = locale.default_locale();
            let prefixed = ensure_locale_prefix(normalized, default, locale.locales());
            if let Some(data) = self.manifest.static_data_route(&prefixed) {
                return Ok(vec![path.to_string(), localize_data_route(data, default)]);
            }
        }

        self.resolve_dynamic(normalized)
            .ok_or_else(|| ResolveError::NotRevalidatable {
                path: normalized.to_string(),
            })
    }

    fn resolve_dynamic(&self, normalized: &str) -> Option<Vec<String>> {
        let (lookup_path, locale) = match &self.locale {
            Some(config) => {
                let locale = first_segment(normalized)
                    .filter(|segment| config.is_locale(segment))
                    .unwrap_or(config.default_locale());
                (unlocalize_path(normalized, config.locales()), Some(locale))
            }
            None => (normalized.into(), None),
        };

        let (entry, captures) = self
            .manifest
            .dynamic_routes()
            .iter()
            .find_map(|entry: &DynamicEntry| {
                entry.regex.captures(&lookup_path).map(|caps| (entry, caps))
            })?;

        // Only blocking fallback caches every rendered path as its own
        // artifact; otherwise a never-prerendered path has nothing to purge.
        if entry.fallback != Fallback::Blocking {
            debug!(
                page = %entry.page,
                fallback = ?entry.fallback,
                "dynamic route has no per-path artifact for unprerendered paths"
            );
            return None;
        }

        let data = substitute_params(&entry.data_template, &captures);
        let data = match locale {
            Some(locale) => localize_data_route(&data, locale),
            None => data,
        };
        Some(vec![normalized.to_string(), data])
    }
}
