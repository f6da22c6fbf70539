//! Next.js build output (`.next/`) manifests
//!
//! Reads `BUILD_ID`, `routes-manifest.json`, `prerender-manifest.json` and
//! `server/middleware-manifest.json` and assembles the framework-neutral
//! inputs of the classifier.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::{
    data_route, ApiKind, Fallback, LocaleConfig, MiddlewareMatchSet, OrderedMap, Revalidate,
    RouteEntry, RouteManifest,
};
use crate::path::localize_path;
use crate::route::is_dynamic_pattern;

/// Pages Next.js lists but that never get a public route of their own
const INTERNAL_PAGES: &[&str] = &["/_app", "/_document", "/_error"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageRegex {
    pub page: String,
    pub regex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct I18nManifest {
    pub locales: Vec<String>,
    pub default_locale: String,
    #[serde(default)]
    pub locale_detection: Option<bool>,
}

/// `routes-manifest.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutesManifest {
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub static_routes: Vec<PageRegex>,
    #[serde(default)]
    pub dynamic_routes: Vec<PageRegex>,
    #[serde(default)]
    pub i18n: Option<I18nManifest>,
}

impl RoutesManifest {
    /// Regex Next.js generated for `page`, if it is a known route
    pub fn page_regex(&self, page: &str) -> Option<&str> {
        self.static_routes
            .iter()
            .chain(&self.dynamic_routes)
            .find(|r| r.page == page)
            .map(|r| r.regex.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderedRoute {
    #[serde(default)]
    pub initial_revalidate_seconds: Option<Revalidate>,
    #[serde(default)]
    pub src_route: Option<String>,
    #[serde(default)]
    pub data_route: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderedDynamicRoute {
    pub route_regex: String,
    #[serde(default)]
    pub data_route: Option<String>,
    #[serde(default = "blocking", deserialize_with = "deserialize_manifest_fallback")]
    pub fallback: Fallback,
}

fn blocking() -> Fallback {
    Fallback::Blocking
}

/// `fallback` here is `string | false | null`: a string names the
/// placeholder page served while rendering.
fn deserialize_manifest_fallback<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Fallback, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Page(String),
        Flag(bool),
    }

    Ok(match Option::<Repr>::deserialize(deserializer)? {
        None => Fallback::Blocking,
        Some(Repr::Page(_)) | Some(Repr::Flag(true)) => Fallback::Placeholder,
        Some(Repr::Flag(false)) => Fallback::Disabled,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewProps {
    /// Also the secret carried by revalidation requests
    pub preview_mode_id: String,
}

/// `prerender-manifest.json`; both maps keep manifest order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderManifest {
    #[serde(default)]
    pub routes: OrderedMap<PrerenderedRoute>,
    #[serde(default)]
    pub dynamic_routes: OrderedMap<PrerenderedDynamicRoute>,
    #[serde(default)]
    pub preview: Option<PreviewProps>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EdgeMatcher {
    pub regexp: String,
}

/// One middleware or edge function from `middleware-manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EdgeFunctionDefinition {
    pub name: String,
    pub page: String,
    #[serde(default)]
    pub matchers: Vec<EdgeMatcher>,
    /// Pre-13 manifests carry a single regex instead of `matchers`
    #[serde(default)]
    pub regexp: Option<String>,
}

impl EdgeFunctionDefinition {
    pub fn matcher_regexps(&self) -> Vec<&str> {
        if self.matchers.is_empty() {
            self.regexp.iter().map(String::as_str).collect()
        } else {
            self.matchers.iter().map(|m| m.regexp.as_str()).collect()
        }
    }
}

/// `server/middleware-manifest.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddlewareManifest {
    #[serde(default)]
    pub sorted_middleware: Vec<String>,
    #[serde(default)]
    pub middleware: OrderedMap<EdgeFunctionDefinition>,
    #[serde(default)]
    pub functions: OrderedMap<EdgeFunctionDefinition>,
}

/// Everything read from one `.next` directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub build_id: String,
    pub routes: RoutesManifest,
    pub prerender: PrerenderManifest,
    pub middleware: MiddlewareManifest,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

impl BuildOutput {
    /// Loads the manifests from a Next.js dist directory
    ///
    /// The middleware manifest is optional; builds without middleware may
    /// not write one.
    pub fn load(dist_dir: impl AsRef<Path>) -> Result<Self> {
        let dist_dir = dist_dir.as_ref();

        let build_id_path = dist_dir.join("BUILD_ID");
        let build_id = fs::read_to_string(&build_id_path)
            .with_context(|| format!("failed to read {}", build_id_path.display()))?
            .trim()
            .to_string();

        let routes = read_json(&dist_dir.join("routes-manifest.json"))?;
        let prerender = read_json(&dist_dir.join("prerender-manifest.json"))?;

        let middleware_path = dist_dir.join("server").join("middleware-manifest.json");
        let middleware = if middleware_path.exists() {
            read_json(&middleware_path)?
        } else {
            debug!(path = %middleware_path.display(), "no middleware manifest");
            MiddlewareManifest::default()
        };

        Ok(Self {
            build_id,
            routes,
            prerender,
            middleware,
        })
    }

    pub fn base_path(&self) -> &str {
        &self.routes.base_path
    }

    pub fn locale_config(&self) -> Result<Option<LocaleConfig>> {
        self.routes
            .i18n
            .as_ref()
            .map(|i18n| {
                LocaleConfig::new(
                    i18n.default_locale.clone(),
                    i18n.locales.clone(),
                    i18n.locale_detection != Some(false),
                )
                .context("invalid i18n configuration in routes-manifest.json")
            })
            .transpose()
    }

    pub fn middleware_match_set(&self) -> MiddlewareMatchSet {
        MiddlewareMatchSet::new(self.middleware.sorted_middleware.iter().cloned())
    }

    /// Builds the route manifest, hidden paths first
    ///
    /// `api_kinds` holds the kind of every non-standard API route, keyed by
    /// page (`/api/cron`); detecting it needs the page source, which the
    /// build output does not carry.
    pub fn route_manifest(&self, api_kinds: &HashMap<String, ApiKind>) -> RouteManifest {
        let entries = self
            .routes
            .static_routes
            .iter()
            .chain(&self.routes.dynamic_routes)
            .map(|r| r.page.as_str())
            .filter(|page| !INTERNAL_PAGES.contains(page))
            .map(|page| self.route_entry(page, api_kinds))
            .collect();

        RouteManifest::new(entries).with_hidden_paths()
    }

    fn route_entry(&self, page: &str, api_kinds: &HashMap<String, ApiKind>) -> RouteEntry {
        if is_api_page(page) {
            let kind = api_kinds.get(page).copied().unwrap_or_default();
            return RouteEntry::api(page, kind);
        }

        if is_dynamic_pattern(page) {
            return match self.prerender.dynamic_routes.get(page) {
                Some(dynamic) => RouteEntry::page(page)
                    .with_data(self.unlocalized_data_route(page, dynamic.data_route.as_deref()))
                    .with_fallback(dynamic.fallback),
                None => self.server_rendered(page),
            };
        }

        match self.prerendered(page) {
            Some(route) => RouteEntry::page(page)
                .with_data(self.unlocalized_data_route(page, route.data_route.as_deref()))
                .with_revalidate(route.initial_revalidate_seconds.unwrap_or(Revalidate::Never)),
            None => self.server_rendered(page),
        }
    }

    /// Pages rendered per request still answer client-side navigations on
    /// their data route.
    fn server_rendered(&self, page: &str) -> RouteEntry {
        RouteEntry::page(page).with_data(data_route(page, &self.build_id, None))
    }

    /// Prerendered entry of a non-dynamic page; with i18n Next.js only
    /// keys it by its locale-prefixed paths.
    fn prerendered(&self, page: &str) -> Option<&PrerenderedRoute> {
        self.prerender.routes.get(page).or_else(|| {
            let i18n = self.routes.i18n.as_ref()?;
            self.prerender
                .routes
                .get(&localize_path(page, &i18n.default_locale))
        })
    }

    /// Data routes are stored unlocalized; the classifier localizes them per
    /// locale. `.rsc` data routes are path-keyed and kept as written.
    fn unlocalized_data_route(&self, page: &str, manifest_data_route: Option<&str>) -> String {
        match manifest_data_route {
            Some(rsc) if rsc.ends_with(".rsc") => rsc.to_string(),
            _ => data_route(page, &self.build_id, None),
        }
    }
}

pub fn is_api_page(page: &str) -> bool {
    page == "/api" || page.starts_with("/api/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::HIDDEN_PATHS;
    use pretty_assertions::assert_eq;

    fn build_output() -> BuildOutput {
        let routes = serde_json::from_str(
            r#"{
                "basePath": "",
                "staticRoutes": [
                    {"page": "/", "regex": "^/(?:/)?$"},
                    {"page": "/about", "regex": "^/about(?:/)?$"},
                    {"page": "/account", "regex": "^/account(?:/)?$"},
                    {"page": "/api/hello", "regex": "^/api/hello(?:/)?$"},
                    {"page": "/api/cron", "regex": "^/api/cron(?:/)?$"}
                ],
                "dynamicRoutes": [
                    {"page": "/posts/[id]", "regex": "^/posts/([^/]+?)(?:/)?$"},
                    {"page": "/users/[id]", "regex": "^/users/([^/]+?)(?:/)?$"}
                ],
                "i18n": {"locales": ["en", "fr"], "defaultLocale": "en"}
            }"#,
        )
        .unwrap();
        let prerender = serde_json::from_str(
            r#"{
                "routes": {
                    "/en": {"initialRevalidateSeconds": false, "srcRoute": null, "dataRoute": "/_next/data/b1/en.json"},
                    "/en/about": {"initialRevalidateSeconds": 120, "srcRoute": null, "dataRoute": "/_next/data/b1/en/about.json"}
                },
                "dynamicRoutes": {
                    "/posts/[id]": {"routeRegex": "^/posts/([^/]+?)(?:/)?$", "dataRoute": "/_next/data/b1/posts/[id].json", "fallback": false}
                }
            }"#,
        )
        .unwrap();
        BuildOutput {
            build_id: "b1".to_string(),
            routes,
            prerender,
            middleware: MiddlewareManifest::default(),
        }
    }

    #[test]
    fn test_route_manifest_assembly() {
        let mut kinds = HashMap::new();
        kinds.insert("/api/cron".to_string(), ApiKind::Scheduled);
        let manifest = build_output().route_manifest(&kinds);
        let entries = &manifest.entries[HIDDEN_PATHS.len()..];

        assert_eq!(
            entries[0],
            RouteEntry::page("/")
                .with_data("/_next/data/b1/index.json")
                .with_revalidate(Revalidate::Never)
        );
        assert_eq!(
            entries[1],
            RouteEntry::page("/about")
                .with_data("/_next/data/b1/about.json")
                .with_revalidate(Revalidate::Seconds(120))
        );
        assert_eq!(
            entries[2],
            RouteEntry::page("/account").with_data("/_next/data/b1/account.json")
        );
        assert_eq!(entries[3], RouteEntry::api("/api/hello", ApiKind::Standard));
        assert_eq!(entries[4], RouteEntry::api("/api/cron", ApiKind::Scheduled));
        assert_eq!(
            entries[5],
            RouteEntry::page("/posts/[id]")
                .with_data("/_next/data/b1/posts/[id].json")
                .with_fallback(Fallback::Disabled)
        );
        assert_eq!(
            entries[6],
            RouteEntry::page("/users/[id]").with_data("/_next/data/b1/users/[id].json")
        );
    }

    #[test]
    fn test_locale_config_from_i18n() {
        let locales = build_output().locale_config().unwrap().unwrap();
        assert_eq!(locales.default_locale(), "en");
        assert!(locales.auto_detect());
        assert_eq!(BuildOutput::default().locale_config().unwrap(), None);
    }

    #[test]
    fn test_manifest_fallback_encoding() {
        let dynamic: OrderedMap<PrerenderedDynamicRoute> = serde_json::from_str(
            r#"{
                "/a/[x]": {"routeRegex": "^/a/([^/]+?)$", "fallback": "/a/[x].html"},
                "/b/[x]": {"routeRegex": "^/b/([^/]+?)$", "fallback": false},
                "/c/[x]": {"routeRegex": "^/c/([^/]+?)$", "fallback": null}
            }"#,
        )
        .unwrap();
        let modes: Vec<Fallback> = dynamic.iter().map(|(_, d)| d.fallback).collect();
        assert_eq!(
            modes,
            vec![Fallback::Placeholder, Fallback::Disabled, Fallback::Blocking]
        );
    }

    #[test]
    fn test_legacy_middleware_regexp() {
        let manifest: MiddlewareManifest = serde_json::from_str(
            r#"{
                "sortedMiddleware": ["/"],
                "middleware": {"/": {"name": "middleware", "page": "/", "regexp": "^/.*$"}}
            }"#,
        )
        .unwrap();
        let definition = manifest.middleware.get("/").unwrap();
        assert_eq!(definition.matcher_regexps(), vec!["^/.*$"]);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = BuildOutput::load("/nonexistent/.next").unwrap_err();
        assert!(format!("{:#}", err).contains("BUILD_ID"));
    }
}
