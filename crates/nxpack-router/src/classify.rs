//! Route classification
//!
//! Assigns every (route, locale form) pair exactly one [`RouteClass`].
//! Output order is hidden paths, API routes, non-dynamic routes, then
//! dynamic routes, each in manifest order; the rule generator relies on
//! concrete paths coming before patterns that could swallow them.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::manifest::{
    localize_data_route, ApiKind, Fallback, LocaleConfig, MiddlewareMatchSet, Revalidate,
    RouteEntry, RouteManifest,
};
use crate::path::localize_path;

/// Shortest revalidate interval the platform supports
pub const MINIMUM_REVALIDATE_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Framework-internal path, answered with a 404
    Hidden,
    Static,
    IncrementalFixedInterval,
    IncrementalOnDemand,
    IncrementalOnDemandNoFallback,
    ServerRendered,
    Api,
    /// Matched by middleware, so it can never be served from cache
    MiddlewareOverridden,
}

impl RouteClass {
    pub fn is_incremental(self) -> bool {
        matches!(
            self,
            RouteClass::IncrementalFixedInterval | RouteClass::IncrementalOnDemand
        )
    }
}

/// Which locale form of a route an entry stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocaleVariant {
    /// No locale configuration, or a route that is never localized
    Unlocalized,
    /// The unprefixed path, served as the default locale
    Naked(String),
    Prefixed(String),
}

impl LocaleVariant {
    pub fn locale(&self) -> Option<&str> {
        match self {
            LocaleVariant::Unlocalized => None,
            LocaleVariant::Naked(locale) | LocaleVariant::Prefixed(locale) => Some(locale),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRoute {
    /// Manifest pattern, unlocalized
    pub route: String,
    /// Page pattern of this locale form
    pub pattern: String,
    pub data_pattern: Option<String>,
    pub locale: LocaleVariant,
    pub class: RouteClass,
    pub api_kind: ApiKind,
    /// Effective interval after clamping, for fixed-interval routes
    pub revalidate_seconds: Option<u64>,
}

impl ClassifiedRoute {
    pub fn is_dynamic(&self) -> bool {
        crate::route::is_dynamic_pattern(&self.route)
    }
}

/// Non-fatal findings worth surfacing to whoever runs the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    ShortRevalidate {
        route: String,
        requested: u64,
        applied: u64,
    },
    MiddlewareOverride {
        route: String,
        previous: RouteClass,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("route {pattern:?} appears more than once in the manifest")]
    Conflict { pattern: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub routes: Vec<ClassifiedRoute>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Classification {
    pub fn of_class(&self, class: RouteClass) -> impl Iterator<Item = &ClassifiedRoute> {
        self.routes.iter().filter(move |r| r.class == class)
    }
}

/// Output group of an entry; lower sorts first
fn precedence_group(entry: &RouteEntry) -> u8 {
    if entry.hidden {
        0
    } else if entry.is_api {
        1
    } else if !entry.is_dynamic() {
        2
    } else {
        3
    }
}

fn base_class(entry: &RouteEntry, diagnostics: &mut Vec<Diagnostic>) -> (RouteClass, Option<u64>) {
    if entry.hidden {
        return (RouteClass::Hidden, None);
    }
    if entry.is_api {
        return (RouteClass::Api, None);
    }

    if entry.is_dynamic() {
        let class = match entry.fallback {
            Some(Fallback::Disabled) => RouteClass::IncrementalOnDemandNoFallback,
            Some(Fallback::Placeholder) | Some(Fallback::Blocking) => {
                RouteClass::IncrementalOnDemand
            }
            None => RouteClass::ServerRendered,
        };
        return (class, None);
    }

    match entry.revalidate {
        Some(Revalidate::Seconds(requested)) if requested < MINIMUM_REVALIDATE_SECONDS => {
            warn!(
                route = %entry.pattern,
                requested,
                applied = MINIMUM_REVALIDATE_SECONDS,
                "revalidate interval below platform minimum, clamping"
            );
            diagnostics.push(Diagnostic::ShortRevalidate {
                route: entry.pattern.clone(),
                requested,
                applied: MINIMUM_REVALIDATE_SECONDS,
            });
            (
                RouteClass::IncrementalFixedInterval,
                Some(MINIMUM_REVALIDATE_SECONDS),
            )
        }
        Some(Revalidate::Seconds(secs)) => (RouteClass::IncrementalFixedInterval, Some(secs)),
        Some(Revalidate::Never) => (RouteClass::Static, None),
        None => (RouteClass::ServerRendered, None),
    }
}

fn locale_forms(
    entry: &RouteEntry,
    class: RouteClass,
    locales: Option<&LocaleConfig>,
) -> Vec<(String, Option<String>, LocaleVariant)> {
    let locales = match locales {
        Some(l) if !matches!(class, RouteClass::Api | RouteClass::Hidden) => l,
        _ => {
            return vec![(
                entry.pattern.clone(),
                entry.data_pattern.clone(),
                LocaleVariant::Unlocalized,
            )]
        }
    };

    let localized_data =
        |locale: &str| entry.data_pattern.as_deref().map(|d| localize_data_route(d, locale));

    let default = locales.default_locale();
    let naked = (
        entry.pattern.clone(),
        localized_data(default),
        LocaleVariant::Naked(default.to_string()),
    );

    std::iter::once(naked)
        .chain(locales.locales().iter().map(|locale| {
            (
                localize_path(&entry.pattern, locale),
                localized_data(locale),
                LocaleVariant::Prefixed(locale.clone()),
            )
        }))
        .collect()
}

/// Classifies every manifest entry and expands it per locale
///
/// Middleware override runs last, on the unlocalized pattern, and is the
/// only step that replaces an earlier class. API routes and hidden paths
/// are never overridden.
pub fn classify(
    manifest: &RouteManifest,
    locales: Option<&LocaleConfig>,
    middleware: &MiddlewareMatchSet,
) -> Result<Classification, ClassifyError> {
    let mut ordered: Vec<&RouteEntry> = manifest.entries.iter().collect();
    ordered.sort_by_key(|entry| precedence_group(entry));

    let mut seen = HashSet::new();
    let mut classification = Classification::default();
    let mut overridden = Vec::new();

    for entry in ordered {
        if !seen.insert(entry.pattern.as_str()) {
            return Err(ClassifyError::Conflict {
                pattern: entry.pattern.clone(),
            });
        }

        let (mut class, revalidate_seconds) = base_class(entry, &mut classification.diagnostics);

        if !matches!(class, RouteClass::Api | RouteClass::Hidden)
            && middleware.matches(&entry.pattern)
        {
            classification
                .diagnostics
                .push(Diagnostic::MiddlewareOverride {
                    route: entry.pattern.clone(),
                    previous: class,
                });
            overridden.push(entry.pattern.as_str());
            class = RouteClass::MiddlewareOverridden;
        }

        let forms = locale_forms(entry, class, locales);
        classification
            .routes
            .extend(forms.into_iter().map(|(pattern, data_pattern, locale)| {
                ClassifiedRoute {
                    route: entry.pattern.clone(),
                    pattern,
                    data_pattern,
                    locale,
                    class,
                    api_kind: entry.api_kind,
                    revalidate_seconds,
                }
            }));
    }

    if !overridden.is_empty() {
        warn!(
            routes = ?overridden,
            "routes matched by middleware are always server-rendered and never cached"
        );
    }
    debug!(
        entries = manifest.entries.len(),
        classified = classification.routes.len(),
        "classified routes"
    );

    Ok(classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn en_fr() -> LocaleConfig {
        LocaleConfig::new("en", vec!["en".into(), "fr".into()], true).unwrap()
    }

    fn only(entry: RouteEntry) -> RouteClass {
        let manifest = RouteManifest::new(vec![entry]);
        classify(&manifest, None, &MiddlewareMatchSet::default()).unwrap().routes[0].class
    }

    #[rstest]
    #[case(RouteEntry::page("/about"), RouteClass::ServerRendered)]
    #[case(RouteEntry::page("/about").with_revalidate(Revalidate::Never), RouteClass::Static)]
    #[case(
        RouteEntry::page("/about").with_revalidate(Revalidate::Seconds(300)),
        RouteClass::IncrementalFixedInterval
    )]
    #[case(RouteEntry::page("/p/[id]"), RouteClass::ServerRendered)]
    #[case(
        RouteEntry::page("/p/[id]").with_fallback(Fallback::Blocking),
        RouteClass::IncrementalOnDemand
    )]
    #[case(
        RouteEntry::page("/p/[id]").with_fallback(Fallback::Placeholder),
        RouteClass::IncrementalOnDemand
    )]
    #[case(
        RouteEntry::page("/p/[id]").with_fallback(Fallback::Disabled),
        RouteClass::IncrementalOnDemandNoFallback
    )]
    #[case(RouteEntry::api("/api/x", ApiKind::Standard), RouteClass::Api)]
    #[case(RouteEntry::hidden("/BUILD_ID"), RouteClass::Hidden)]
    fn test_base_classes(#[case] entry: RouteEntry, #[case] expected: RouteClass) {
        assert_eq!(only(entry), expected);
    }

    #[test]
    fn test_short_revalidate_is_clamped_with_diagnostic() {
        let manifest = RouteManifest::new(vec![
            RouteEntry::page("/fast").with_revalidate(Revalidate::Seconds(5))
        ]);
        let result = classify(&manifest, None, &MiddlewareMatchSet::default()).unwrap();
        assert_eq!(result.routes[0].revalidate_seconds, Some(60));
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::ShortRevalidate {
                route: "/fast".to_string(),
                requested: 5,
                applied: 60,
            }]
        );
    }

    #[test]
    fn test_locale_expansion_naked_first() {
        let manifest = RouteManifest::new(vec![RouteEntry::page("/about")
            .with_data("/_next/data/b1/about.json")
            .with_revalidate(Revalidate::Seconds(120))]);
        let locales = en_fr();
        let result = classify(&manifest, Some(&locales), &MiddlewareMatchSet::default()).unwrap();

        let forms: Vec<(&str, Option<&str>, Option<&str>)> = result
            .routes
            .iter()
            .map(|r| (r.pattern.as_str(), r.data_pattern.as_deref(), r.locale.locale()))
            .collect();
        assert_eq!(
            forms,
            vec![
                ("/about", Some("/_next/data/b1/en/about.json"), Some("en")),
                ("/en/about", Some("/_next/data/b1/en/about.json"), Some("en")),
                ("/fr/about", Some("/_next/data/b1/fr/about.json"), Some("fr")),
            ]
        );
        assert!(result
            .routes
            .iter()
            .all(|r| r.class == RouteClass::IncrementalFixedInterval));
        assert!(matches!(result.routes[0].locale, LocaleVariant::Naked(_)));
    }

    #[test]
    fn test_api_and_hidden_are_never_localized() {
        let manifest = RouteManifest::new(vec![
            RouteEntry::api("/api/x", ApiKind::Standard),
            RouteEntry::hidden("/trace"),
        ]);
        let locales = en_fr();
        let result = classify(&manifest, Some(&locales), &MiddlewareMatchSet::default()).unwrap();
        assert_eq!(result.routes.len(), 2);
        assert!(result
            .routes
            .iter()
            .all(|r| r.locale == LocaleVariant::Unlocalized));
    }

    #[test]
    fn test_middleware_overrides_cached_routes() {
        let manifest = RouteManifest::new(vec![
            RouteEntry::page("/shop/cart").with_revalidate(Revalidate::Seconds(120)),
            RouteEntry::page("/shopping").with_revalidate(Revalidate::Seconds(120)),
            RouteEntry::api("/shop/api", ApiKind::Standard),
        ]);
        let locales = en_fr();
        let result =
            classify(&manifest, Some(&locales), &MiddlewareMatchSet::new(["/shop"])).unwrap();

        let classes: Vec<(&str, RouteClass)> = result
            .routes
            .iter()
            .map(|r| (r.pattern.as_str(), r.class))
            .collect();
        assert_eq!(
            classes,
            vec![
                ("/shop/api", RouteClass::Api),
                ("/shop/cart", RouteClass::MiddlewareOverridden),
                ("/en/shop/cart", RouteClass::MiddlewareOverridden),
                ("/fr/shop/cart", RouteClass::MiddlewareOverridden),
                ("/shopping", RouteClass::IncrementalFixedInterval),
                ("/en/shopping", RouteClass::IncrementalFixedInterval),
                ("/fr/shopping", RouteClass::IncrementalFixedInterval),
            ]
        );
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::MiddlewareOverride {
                route: "/shop/cart".to_string(),
                previous: RouteClass::IncrementalFixedInterval,
            }]
        );
    }

    #[test]
    fn test_output_groups_keep_manifest_order() {
        let manifest = RouteManifest::new(vec![
            RouteEntry::page("/[slug]"),
            RouteEntry::page("/b"),
            RouteEntry::api("/api/z", ApiKind::Standard),
            RouteEntry::page("/a"),
            RouteEntry::hidden("/trace"),
        ]);
        let result = classify(&manifest, None, &MiddlewareMatchSet::default()).unwrap();
        let patterns: Vec<&str> = result.routes.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["/trace", "/api/z", "/b", "/a", "/[slug]"]);
    }

    #[test]
    fn test_duplicate_pattern_is_a_conflict() {
        let manifest = RouteManifest::new(vec![RouteEntry::page("/a"), RouteEntry::page("/a")]);
        assert_eq!(
            classify(&manifest, None, &MiddlewareMatchSet::default()).unwrap_err(),
            ClassifyError::Conflict {
                pattern: "/a".to_string()
            }
        );
    }
}
