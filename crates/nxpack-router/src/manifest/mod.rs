//! Build-time inputs: route manifest, locale config, middleware match set
//!
//! These are the framework-neutral shapes the classifier works on. The
//! `next` submodule reads the actual Next.js manifest files and assembles
//! them.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::path::PathHierarchy;
use crate::route::is_dynamic_pattern;

pub mod next;
pub mod ordered;

pub use ordered::OrderedMap;

/// Framework-internal paths that must never be publicly reachable
pub const HIDDEN_PATHS: &[&str] = &[
    "/cache/*",
    "/server/*",
    "/serverless/*",
    "/trace",
    "/traces",
    "/routes-manifest.json",
    "/build-manifest.json",
    "/prerender-manifest.json",
    "/react-loadable-manifest.json",
    "/BUILD_ID",
];

const DATA_PREFIX: &str = "/_next/data/";

/// Revalidation setting of a prerendered route: `number | false`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidate {
    /// `false`: fully static, never regenerated
    Never,
    /// Regenerate at most every N seconds
    Seconds(u64),
}

impl Serialize for Revalidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Revalidate::Never => serializer.serialize_bool(false),
            Revalidate::Seconds(secs) => serializer.serialize_u64(*secs),
        }
    }
}

impl<'de> Deserialize<'de> for Revalidate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Seconds(u64),
            Flag(bool),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Seconds(secs) => Ok(Revalidate::Seconds(secs)),
            Repr::Flag(false) => Ok(Revalidate::Never),
            Repr::Flag(true) => Err(serde::de::Error::custom(
                "revalidate must be a number of seconds or false",
            )),
        }
    }
}

/// Fallback mode of a dynamic route with prerendered paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// `fallback: false`: unknown paths 404
    Disabled,
    /// `fallback: true`: unknown paths get a placeholder, rendered client-side
    Placeholder,
    /// `fallback: 'blocking'` (`null` in manifests): rendered on first request
    Blocking,
}

impl Fallback {
    /// Maps the manifest's `true | false | null` encoding
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(false) => Fallback::Disabled,
            Some(true) => Fallback::Placeholder,
            None => Fallback::Blocking,
        }
    }

    fn as_flag(self) -> Option<bool> {
        match self {
            Fallback::Disabled => Some(false),
            Fallback::Placeholder => Some(true),
            Fallback::Blocking => None,
        }
    }
}

fn deserialize_fallback<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Fallback>, D::Error> {
    Option::<bool>::deserialize(deserializer).map(|flag| Some(Fallback::from_flag(flag)))
}

fn serialize_fallback<S: Serializer>(
    fallback: &Option<Fallback>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match fallback {
        Some(f) => f.as_flag().serialize(serializer),
        None => serializer.serialize_none(),
    }
}

/// How an API route may be invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    #[default]
    Standard,
    /// Runs asynchronously; deployed as a background function
    Background,
    /// Time-triggered only; never directly invokable
    Scheduled,
}

/// One logical route from the framework build
///
/// `fallback: None` means the route is not in the prerender set; a present
/// `null` in JSON is `Some(Fallback::Blocking)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_pattern: Option<String>,
    #[serde(
        default,
        rename = "revalidateSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub revalidate: Option<Revalidate>,
    #[serde(
        default,
        deserialize_with = "deserialize_fallback",
        serialize_with = "serialize_fallback",
        skip_serializing_if = "Option::is_none"
    )]
    pub fallback: Option<Fallback>,
    #[serde(default)]
    pub is_api: bool,
    #[serde(default)]
    pub api_kind: ApiKind,
    #[serde(default)]
    pub hidden: bool,
}

impl RouteEntry {
    /// A page route, server-rendered until told otherwise
    pub fn page(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            data_pattern: None,
            revalidate: None,
            fallback: None,
            is_api: false,
            api_kind: ApiKind::Standard,
            hidden: false,
        }
    }

    pub fn api(pattern: impl Into<String>, kind: ApiKind) -> Self {
        Self {
            is_api: true,
            api_kind: kind,
            ..Self::page(pattern)
        }
    }

    pub fn hidden(pattern: impl Into<String>) -> Self {
        Self {
            hidden: true,
            ..Self::page(pattern)
        }
    }

    pub fn with_data(mut self, data_pattern: impl Into<String>) -> Self {
        self.data_pattern = Some(data_pattern.into());
        self
    }

    pub fn with_revalidate(mut self, revalidate: Revalidate) -> Self {
        self.revalidate = Some(revalidate);
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn is_dynamic(&self) -> bool {
        is_dynamic_pattern(&self.pattern)
    }
}

/// Union of all per-route metadata of one build, in manifest order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteManifest {
    pub entries: Vec<RouteEntry>,
}

impl RouteManifest {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Prepends an entry for each of [`HIDDEN_PATHS`]
    pub fn with_hidden_paths(mut self) -> Self {
        let hidden = HIDDEN_PATHS.iter().map(|p| RouteEntry::hidden(*p));
        self.entries.splice(0..0, hidden);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocaleError {
    #[error("locale list is empty")]
    NoLocales,
    #[error("default locale {0:?} is not in the locale list")]
    UnknownDefault(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocaleConfig {
    default_locale: Option<String>,
    #[serde(default)]
    locales: Vec<String>,
    #[serde(default = "default_auto_detect")]
    auto_detect: bool,
}

fn default_auto_detect() -> bool {
    true
}

impl TryFrom<RawLocaleConfig> for LocaleConfig {
    type Error = LocaleError;

    fn try_from(raw: RawLocaleConfig) -> Result<Self, Self::Error> {
        let default_locale = match raw.default_locale {
            Some(locale) => locale,
            None => raw.locales.first().cloned().ok_or(LocaleError::NoLocales)?,
        };
        LocaleConfig::new(default_locale, raw.locales, raw.auto_detect)
    }
}

/// Locale configuration; the default locale is always one of `locales`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLocaleConfig", rename_all = "camelCase")]
pub struct LocaleConfig {
    default_locale: String,
    locales: Vec<String>,
    auto_detect: bool,
}

impl LocaleConfig {
    pub fn new(
        default_locale: impl Into<String>,
        locales: Vec<String>,
        auto_detect: bool,
    ) -> Result<Self, LocaleError> {
        let default_locale = default_locale.into();
        if locales.is_empty() {
            return Err(LocaleError::NoLocales);
        }
        if !locales.contains(&default_locale) {
            return Err(LocaleError::UnknownDefault(default_locale));
        }
        Ok(Self {
            default_locale,
            locales,
            auto_detect,
        })
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    /// Whether locale-detection redirects should be generated
    pub fn auto_detect(&self) -> bool {
        self.auto_detect
    }

    pub fn is_locale(&self, segment: &str) -> bool {
        self.locales.iter().any(|l| l == segment)
    }
}

/// Path prefixes whose requests must always reach the server renderer
///
/// Built once per build and read-only afterwards. Matching is per segment:
/// `/blog` covers `/blog` and `/blog/[slug]` but not `/blogging`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiddlewareMatchSet {
    prefixes: Vec<String>,
}

impl MiddlewareMatchSet {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let prefixes = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|prefix: &String| seen.insert(prefix.clone()))
            .collect();
        Self { prefixes }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Whether `path` (an unlocalized pattern) falls under any prefix
    pub fn matches(&self, path: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| PathHierarchy::new(path).contains(prefix))
    }
}

/// Data route of a page: `/_next/data/<build-id>[/<locale>]/<route>.json`
///
/// ```
/// use nxpack_router::manifest::data_route;
///
/// assert_eq!(data_route("/", "b1", None), "/_next/data/b1/index.json");
/// assert_eq!(data_route("/", "b1", Some("fr")), "/_next/data/b1/fr.json");
/// assert_eq!(data_route("/posts/[id]", "b1", Some("fr")), "/_next/data/b1/fr/posts/[id].json");
/// ```
pub fn data_route(route: &str, build_id: &str, locale: Option<&str>) -> String {
    let locale_part = locale.map(|l| format!("/{}", l)).unwrap_or_default();
    let route_part = match (route, locale) {
        ("/", Some(_)) => "",
        ("/", None) => "/index",
        (route, _) => route,
    };
    format!("{}{}{}{}.json", DATA_PREFIX, build_id, locale_part, route_part)
}

/// Places `locale` after the build id of a data route
///
/// Data routes of the suffix-based generation (`.rsc`) are keyed by path
/// alone and are returned unchanged. A root `index.json` becomes
/// `<locale>.json`. Already-localized routes are left as they are.
///
/// ```
/// use nxpack_router::manifest::localize_data_route;
///
/// assert_eq!(
///     localize_data_route("/_next/data/b1/about.json", "fr"),
///     "/_next/data/b1/fr/about.json"
/// );
/// assert_eq!(localize_data_route("/_next/data/b1/index.json", "fr"), "/_next/data/b1/fr.json");
/// assert_eq!(localize_data_route("/about.rsc", "fr"), "/about.rsc");
/// ```
pub fn localize_data_route(data_route: &str, locale: &str) -> String {
    if data_route.ends_with(".rsc") {
        return data_route.to_string();
    }

    let localized = data_route
        .find(DATA_PREFIX)
        .map(|start| start + DATA_PREFIX.len())
        .and_then(|after_prefix| {
            data_route[after_prefix..]
                .find('/')
                .map(|rel| after_prefix + rel + 1)
        })
        .map(|split| {
            let (head, rest) = data_route.split_at(split);
            let already_localized = rest
                .strip_prefix(locale)
                .is_some_and(|r| r.starts_with('/') || r == ".json");
            if already_localized {
                data_route.to_string()
            } else {
                format!("{}{}/{}", head, locale, rest)
            }
        })
        .unwrap_or_else(|| data_route.to_string());

    match localized.strip_suffix("/index.json") {
        Some(stripped) => format!("{}.json", stripped),
        None => localized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_route_entry_json_shape() {
        let entry: RouteEntry = serde_json::from_str(
            r#"{"pattern": "/posts/[id]", "dataPattern": "/_next/data/b/posts/[id].json", "fallback": null}"#,
        )
        .unwrap();
        assert_eq!(entry.fallback, Some(Fallback::Blocking));
        assert_eq!(entry.revalidate, None);
        assert!(!entry.is_api);

        let entry: RouteEntry = serde_json::from_str(r#"{"pattern": "/about"}"#).unwrap();
        assert_eq!(entry.fallback, None);
    }

    #[test]
    fn test_revalidate_json_shape() {
        let entry: RouteEntry =
            serde_json::from_str(r#"{"pattern": "/a", "revalidateSeconds": false}"#).unwrap();
        assert_eq!(entry.revalidate, Some(Revalidate::Never));
        let entry: RouteEntry =
            serde_json::from_str(r#"{"pattern": "/a", "revalidateSeconds": 30}"#).unwrap();
        assert_eq!(entry.revalidate, Some(Revalidate::Seconds(30)));
        assert!(serde_json::from_str::<RouteEntry>(r#"{"pattern": "/a", "revalidateSeconds": true}"#).is_err());
    }

    #[test]
    fn test_fallback_serializes_back() {
        let entry = RouteEntry::page("/p/[id]").with_fallback(Fallback::Blocking);
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("fallback").unwrap().is_null());

        let entry = RouteEntry::page("/p/[id]");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("fallback").is_none());
    }

    #[test]
    fn test_locale_config_rejects_unknown_default() {
        let err = LocaleConfig::new("de", vec!["en".into(), "fr".into()], true).unwrap_err();
        assert_eq!(err, LocaleError::UnknownDefault("de".to_string()));
        assert_eq!(
            LocaleConfig::new("en", vec![], true).unwrap_err(),
            LocaleError::NoLocales
        );
    }

    #[test]
    fn test_locale_config_from_json_checks_invariant() {
        let ok: LocaleConfig =
            serde_json::from_str(r#"{"defaultLocale": "en", "locales": ["en", "fr"]}"#).unwrap();
        assert!(ok.auto_detect());
        assert!(serde_json::from_str::<LocaleConfig>(
            r#"{"defaultLocale": "de", "locales": ["en"]}"#
        )
        .is_err());
    }

    #[test]
    fn test_middleware_match_set() {
        let set = MiddlewareMatchSet::new(["/blog", "/shop/"]);
        assert!(set.matches("/blog"));
        assert!(set.matches("/blog/[slug]"));
        assert!(set.matches("/shop/item"));
        assert!(!set.matches("/blogging"));
        assert!(!set.matches("/"));

        let root = MiddlewareMatchSet::new(["/"]);
        assert!(root.matches("/anything/at/all"));
        assert!(!MiddlewareMatchSet::default().matches("/"));
    }

    #[test]
    fn test_middleware_match_set_drops_repeated_prefixes() {
        let set = MiddlewareMatchSet::new(["/blog", "/shop", "/blog", "/shop", "/account"]);
        assert_eq!(set.prefixes(), ["/blog", "/shop", "/account"]);
    }

    #[test]
    fn test_with_hidden_paths_goes_first() {
        let manifest = RouteManifest::new(vec![RouteEntry::page("/about")]).with_hidden_paths();
        assert_eq!(manifest.entries.len(), HIDDEN_PATHS.len() + 1);
        assert!(manifest.entries[0].hidden);
        assert_eq!(manifest.entries.last().unwrap().pattern, "/about");
    }

    #[test]
    fn test_localize_data_route_is_idempotent() {
        let once = localize_data_route("/_next/data/b1/blog/post.json", "en");
        assert_eq!(once, "/_next/data/b1/en/blog/post.json");
        assert_eq!(localize_data_route(&once, "en"), once);
        assert_eq!(localize_data_route("/_next/data/b1/en.json", "en"), "/_next/data/b1/en.json");
    }

    #[test]
    fn test_localize_data_route_roundtrips_data_route() {
        for route in ["/", "/about", "/posts/[id]"] {
            assert_eq!(
                localize_data_route(&data_route(route, "b1", None), "fr"),
                data_route(route, "b1", Some("fr"))
            );
        }
    }
}
