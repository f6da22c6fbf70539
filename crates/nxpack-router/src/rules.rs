//! Rewrite rule generation
//!
//! The platform evaluates rules top to bottom and stops at the first match,
//! so the order of the returned list is part of its meaning:
//!
//! 1. hidden paths (404) and static asset rewrites
//! 2. locale detection redirects
//! 3. API routes
//! 4. preview mode bypass
//! 5. per-route rules, data route before page route
//! 6. the terminal catch-all

use std::collections::{HashMap, HashSet};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::classify::{Classification, ClassifiedRoute, RouteClass};
use crate::manifest::{ApiKind, LocaleConfig};
use crate::path::with_base_path;
use crate::route::translate_dynamic_segments;

/// Function that renders every request
pub const HANDLER_FUNCTION: &str = "/.netlify/functions/___netlify-handler";
/// On-demand builder: renders once, then serves from cache
pub const ODB_FUNCTION: &str = "/.netlify/builders/___netlify-odb-handler";

pub const PREVIEW_COOKIES: [&str; 2] = ["__prerender_bypass", "__next_preview_data"];
pub const LOCALE_COOKIE: &str = "NEXT_LOCALE";

/// Request predicate attached to a rule
///
/// Serializes in the platform's `{"<header>": [values]}` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    pub header: String,
    pub values: Vec<String>,
}

impl Condition {
    pub fn cookies<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: "Cookie".to_string(),
            values: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn language(locale: &str) -> Self {
        Self {
            header: "Language".to_string(),
            values: vec![locale.to_string()],
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.header, &self.values)?;
        map.end()
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteRule {
    pub from: String,
    pub to: String,
    pub status: u16,
    #[serde(skip_serializing_if = "is_false")]
    pub force: bool,
    #[serde(rename = "conditions", skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl RewriteRule {
    /// Unforced 200 rewrite
    pub fn rewrite(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            status: 200,
            force: false,
            condition: None,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Rewrite targets of the two catch-all functions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionTargets {
    /// Always-server-rendered target
    pub server: String,
    /// On-demand builder target
    pub builder: String,
}

impl Default for FunctionTargets {
    fn default() -> Self {
        Self {
            server: HANDLER_FUNCTION.to_string(),
            builder: ODB_FUNCTION.to_string(),
        }
    }
}

/// Everything besides the classification that shapes the rule list
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub base_path: String,
    pub locale: Option<LocaleConfig>,
    pub trailing_slash: bool,
    pub targets: FunctionTargets,
    /// API route pattern → dedicated function target
    pub api_targets: HashMap<String, String>,
    /// Files served as-is even in preview mode, relative to the site root
    pub public_files: Vec<String>,
}

impl RuleContext {
    fn source(&self, pattern: &str) -> String {
        with_base_path(&self.base_path, pattern)
    }

    fn catch_all(&self) -> String {
        self.source("/*")
    }
}

fn hidden_rules(classification: &Classification, ctx: &RuleContext) -> Vec<RewriteRule> {
    let hidden = classification.of_class(RouteClass::Hidden).map(|route| {
        RewriteRule::rewrite(ctx.source(&route.pattern), "/404.html")
            .with_status(404)
            .forced()
    });

    let localized_assets = ctx
        .locale
        .as_ref()
        .map(|_| RewriteRule::rewrite(ctx.source("/:locale/_next/static/*"), "/static/:splat"));

    hidden
        .chain(std::iter::once(RewriteRule::rewrite(
            ctx.source("/_next/static/*"),
            "/static/:splat",
        )))
        .chain(localized_assets)
        .collect()
}

fn locale_rules(ctx: &RuleContext) -> Vec<RewriteRule> {
    let locales = match &ctx.locale {
        Some(l) if l.auto_detect() => l,
        _ => return Vec::new(),
    };

    let root = ctx.source("/");
    let cookie = RewriteRule::rewrite(root.clone(), ctx.targets.server.clone())
        .forced()
        .when(Condition::cookies([LOCALE_COOKIE]));

    let language = locales
        .locales()
        .iter()
        .filter(|l| l.as_str() != locales.default_locale())
        .map(|locale| {
            let slash = if ctx.trailing_slash { "/" } else { "" };
            let to = format!("{}{}", ctx.source(&format!("/{}", locale)), slash);
            RewriteRule::rewrite(root.clone(), to)
                .with_status(301)
                .forced()
                .when(Condition::language(locale))
        });

    std::iter::once(cookie).chain(language).collect()
}

fn api_rules(classification: &Classification, ctx: &RuleContext) -> Vec<RewriteRule> {
    let per_route = classification
        .of_class(RouteClass::Api)
        .flat_map(|route| {
            let target = match route.api_kind {
                ApiKind::Scheduled => None,
                _ => Some(
                    ctx.api_targets
                        .get(&route.route)
                        .cloned()
                        .unwrap_or_else(|| ctx.targets.server.clone()),
                ),
            };
            translate_dynamic_segments(&route.pattern)
                .into_iter()
                .map(move |pattern| match &target {
                    Some(to) => RewriteRule::rewrite(ctx.source(&pattern), to.clone()),
                    None => {
                        RewriteRule::rewrite(ctx.source(&pattern), "/404.html").with_status(404)
                    }
                })
        });

    per_route
        .chain(std::iter::once(RewriteRule::rewrite(
            ctx.source("/api/*"),
            ctx.targets.server.clone(),
        )))
        .collect()
}

fn preview_rules(ctx: &RuleContext) -> Vec<RewriteRule> {
    let bypass = || Condition::cookies(PREVIEW_COOKIES);

    ctx.public_files
        .iter()
        .map(|file| {
            let path = if file.starts_with('/') {
                file.clone()
            } else {
                format!("/{}", file)
            };
            let from = ctx.source(&path);
            RewriteRule::rewrite(from.clone(), from).when(bypass())
        })
        .chain(std::iter::once(
            RewriteRule::rewrite(ctx.catch_all(), ctx.targets.server.clone())
                .forced()
                .when(bypass()),
        ))
        .collect()
}

/// Target of a per-route rule, or `None` for routes served as files
fn route_rule(route: &ClassifiedRoute, ctx: &RuleContext) -> Option<RewriteRule> {
    let template = match route.class {
        RouteClass::IncrementalFixedInterval | RouteClass::IncrementalOnDemand => {
            RewriteRule::rewrite("", ctx.targets.builder.clone()).forced()
        }
        RouteClass::IncrementalOnDemandNoFallback => {
            let to = match route.locale.locale() {
                Some(locale) => format!("/server/pages/{}/404.html", locale),
                None => "/server/pages/404.html".to_string(),
            };
            RewriteRule::rewrite("", to).with_status(404)
        }
        RouteClass::ServerRendered => RewriteRule::rewrite("", ctx.targets.server.clone()),
        RouteClass::MiddlewareOverridden => {
            RewriteRule::rewrite("", ctx.targets.server.clone()).forced()
        }
        RouteClass::Static | RouteClass::Api | RouteClass::Hidden => return None,
    };
    Some(template)
}

fn page_rules(classification: &Classification, ctx: &RuleContext) -> Vec<RewriteRule> {
    let mut seen = HashSet::new();

    classification
        .routes
        .iter()
        .filter_map(|route| route_rule(route, ctx).map(|template| (route, template)))
        .flat_map(|(route, template)| {
            route
                .data_pattern
                .iter()
                .chain(std::iter::once(&route.pattern))
                .flat_map(|pattern| translate_dynamic_segments(pattern))
                .map(move |pattern| RewriteRule {
                    from: ctx.source(&pattern),
                    ..template.clone()
                })
                .collect::<Vec<_>>()
        })
        .filter(|rule| seen.insert((rule.from.clone(), rule.condition.clone())))
        .collect()
}

/// Builds the complete, ordered rule list for one build
pub fn generate_rules(classification: &Classification, ctx: &RuleContext) -> Vec<RewriteRule> {
    let rules: Vec<RewriteRule> = [
        hidden_rules(classification, ctx),
        locale_rules(ctx),
        api_rules(classification, ctx),
        preview_rules(ctx),
        page_rules(classification, ctx),
        vec![RewriteRule::rewrite(
            ctx.catch_all(),
            ctx.targets.server.clone(),
        )],
    ]
    .concat();

    debug!(rules = rules.len(), "generated rewrite rules");
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::manifest::{Fallback, MiddlewareMatchSet, Revalidate, RouteEntry, RouteManifest};
    use pretty_assertions::assert_eq;

    fn rules_for(entries: Vec<RouteEntry>, ctx: &RuleContext) -> Vec<RewriteRule> {
        let manifest = RouteManifest::new(entries);
        let classification =
            classify(&manifest, ctx.locale.as_ref(), &MiddlewareMatchSet::default()).unwrap();
        generate_rules(&classification, ctx)
    }

    fn section(rules: &[RewriteRule]) -> Vec<(&str, &str, u16, bool)> {
        rules
            .iter()
            .map(|r| (r.from.as_str(), r.to.as_str(), r.status, r.force))
            .collect()
    }

    #[test]
    fn test_minimal_rule_list() {
        let rules = rules_for(vec![], &RuleContext::default());
        assert_eq!(
            section(&rules),
            vec![
                ("/_next/static/*", "/static/:splat", 200, false),
                ("/api/*", HANDLER_FUNCTION, 200, false),
                ("/*", HANDLER_FUNCTION, 200, true),
                ("/*", HANDLER_FUNCTION, 200, false),
            ]
        );
        assert_eq!(rules[2].condition, Some(Condition::cookies(PREVIEW_COOKIES)));
        assert_eq!(rules[3].condition, None);
    }

    #[test]
    fn test_data_rule_precedes_page_rule() {
        let rules = rules_for(
            vec![RouteEntry::page("/posts/[id]")
                .with_data("/_next/data/b1/posts/[id].json")
                .with_fallback(Fallback::Blocking)],
            &RuleContext::default(),
        );
        let per_route: Vec<_> = rules.iter().filter(|r| r.to == ODB_FUNCTION).collect();
        assert_eq!(per_route[0].from, "/_next/data/b1/posts/:id.json");
        assert_eq!(per_route[1].from, "/posts/:id");
        assert!(per_route.iter().all(|r| r.force));
    }

    #[test]
    fn test_no_fallback_rewrites_to_404_unforced() {
        let ctx = RuleContext {
            locale: Some(
                LocaleConfig::new("en", vec!["en".into(), "fr".into()], false).unwrap(),
            ),
            ..RuleContext::default()
        };
        let rules = rules_for(
            vec![RouteEntry::page("/p/[id]").with_fallback(Fallback::Disabled)],
            &ctx,
        );
        let not_found: Vec<_> = rules
            .iter()
            .filter(|r| r.status == 404)
            .map(|r| (r.from.as_str(), r.to.as_str(), r.force))
            .collect();
        assert_eq!(
            not_found,
            vec![
                ("/p/:id", "/server/pages/en/404.html", false),
                ("/en/p/:id", "/server/pages/en/404.html", false),
                ("/fr/p/:id", "/server/pages/fr/404.html", false),
            ]
        );
    }

    #[test]
    fn test_static_routes_get_no_rule() {
        let rules = rules_for(
            vec![RouteEntry::page("/about")
                .with_data("/_next/data/b1/about.json")
                .with_revalidate(Revalidate::Never)],
            &RuleContext::default(),
        );
        assert!(rules.iter().all(|r| !r.from.contains("about")));
    }

    #[test]
    fn test_locale_redirects() {
        let ctx = RuleContext {
            base_path: "/docs".to_string(),
            locale: Some(
                LocaleConfig::new("en", vec!["en".into(), "fr".into(), "de".into()], true)
                    .unwrap(),
            ),
            trailing_slash: true,
            ..RuleContext::default()
        };
        let rules = locale_rules(&ctx);
        assert_eq!(
            section(&rules),
            vec![
                ("/docs/", HANDLER_FUNCTION, 200, true),
                ("/docs/", "/docs/fr/", 301, true),
                ("/docs/", "/docs/de/", 301, true),
            ]
        );
        assert_eq!(rules[0].condition, Some(Condition::cookies([LOCALE_COOKIE])));
        assert_eq!(rules[2].condition, Some(Condition::language("de")));
    }

    #[test]
    fn test_scheduled_api_routes_404() {
        let mut api_targets = HashMap::new();
        api_targets.insert(
            "/api/hello".to_string(),
            "/.netlify/functions/api-handler".to_string(),
        );
        let ctx = RuleContext {
            api_targets,
            ..RuleContext::default()
        };
        let rules = rules_for(
            vec![
                RouteEntry::api("/api/hello", ApiKind::Standard),
                RouteEntry::api("/api/cron", ApiKind::Scheduled),
                RouteEntry::api("/api/other", ApiKind::Standard),
            ],
            &ctx,
        );
        let api: Vec<_> = rules.iter().filter(|r| r.from.starts_with("/api")).collect();
        assert_eq!(api[0].to, "/.netlify/functions/api-handler");
        assert_eq!((api[1].to.as_str(), api[1].status), ("/404.html", 404));
        assert_eq!(api[2].to, HANDLER_FUNCTION);
        assert_eq!(api[3].from, "/api/*");
    }

    #[test]
    fn test_preview_exempts_public_files() {
        let ctx = RuleContext {
            public_files: vec!["favicon.ico".to_string(), "/robots.txt".to_string()],
            ..RuleContext::default()
        };
        let rules = preview_rules(&ctx);
        assert_eq!(
            section(&rules),
            vec![
                ("/favicon.ico", "/favicon.ico", 200, false),
                ("/robots.txt", "/robots.txt", 200, false),
                ("/*", HANDLER_FUNCTION, 200, true),
            ]
        );
    }

    #[test]
    fn test_rule_json_shape() {
        let rule = RewriteRule::rewrite("/a", "/b");
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            serde_json::json!({"from": "/a", "to": "/b", "status": 200})
        );
        let rule = RewriteRule::rewrite("/", "/fr")
            .with_status(301)
            .forced()
            .when(Condition::language("fr"));
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            serde_json::json!({
                "from": "/",
                "to": "/fr",
                "status": 301,
                "force": true,
                "conditions": {"Language": ["fr"]}
            })
        );
    }
}
