//! Translation of Next.js route patterns into platform rewrite patterns
//!
//! The platform understands `:name` placeholders and a trailing `*` splat.
//! Next.js patterns use `[name]`, `[...name]` and `[[...name]]`. The optional
//! catch-all has no single platform equivalent, so it becomes two patterns.

use once_cell::sync::Lazy;
use regex::Regex;

use super::pattern::{classify_segment, PatternSegmentType};

/// `/_next/data/<build-id>.json` produced for a top-level optional catch-all
static TOP_LEVEL_DATA_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/_next/data/[^/]+)\.json$").expect("static regex"));

/// Fold accumulator for [`translate_dynamic_segments`]
#[derive(Default)]
struct TranslateState {
    pattern: String,
    /// Set when an optional catch-all was seen: the pattern without it
    base: Option<String>,
}

impl TranslateState {
    fn with_static_segment(mut self, segment: &str) -> Self {
        self.pattern.push('/');
        self.pattern.push_str(segment);
        self
    }

    fn with_dynamic(mut self, name: &str, suffix: &str) -> Self {
        self.pattern.push_str("/:");
        self.pattern.push_str(name);
        self.pattern.push_str(suffix);
        self
    }

    fn with_catch_all(mut self, name: &str) -> Self {
        self.pattern.push_str("/:");
        self.pattern.push_str(name);
        self.pattern.push_str("/*");
        self
    }

    fn with_optional_catch_all(mut self, suffix: &str) -> Self {
        let mut base = self.pattern.clone();
        base.push_str(suffix);
        if base.is_empty() || base.starts_with('.') {
            base.insert(0, '/');
        }
        self.base = Some(fix_top_level_data_route(base));
        self.pattern.push_str("/*");
        self
    }

    fn finalize(mut self) -> Self {
        if self.pattern.is_empty() {
            self.pattern = "/".to_string();
        }
        self
    }

    fn into_patterns(self) -> Vec<String> {
        match self.base {
            Some(base) => vec![base, self.pattern],
            None => vec![self.pattern],
        }
    }
}

/// Rewrites `/_next/data/<id>.json` to `/_next/data/<id>/index.json`
///
/// Next.js requests the data file of a top-level page as `index.json`, but
/// stripping a top-level `[[...slug]]` from `/_next/data/<id>/[[...slug]].json`
/// leaves the build id itself carrying the `.json` extension.
fn fix_top_level_data_route(base: String) -> String {
    match TOP_LEVEL_DATA_ROUTE.captures(&base) {
        Some(caps) => format!("{}/index.json", &caps[1]),
        None => base,
    }
}

fn process_segment(state: TranslateState, segment: &str) -> TranslateState {
    if segment.is_empty() {
        return state;
    }

    match classify_segment(segment) {
        PatternSegmentType::OptionalCatchAll { suffix, .. } => {
            state.with_optional_catch_all(&suffix)
        }
        PatternSegmentType::CatchAll { name, .. } => state.with_catch_all(&name),
        PatternSegmentType::Dynamic { name, suffix } => state.with_dynamic(&name, &suffix),
        PatternSegmentType::Static(seg) => state.with_static_segment(&seg),
    }
}

/// Translates a Next.js route pattern into platform patterns (pure function)
///
/// Returns one pattern, or two for an optional catch-all: the base path
/// (no parameters) first, then the splat form.
///
/// # Examples
///
/// ```
/// use nxpack_router::route::translate_dynamic_segments;
///
/// assert_eq!(translate_dynamic_segments("/posts/[id]"), vec!["/posts/:id"]);
/// assert_eq!(translate_dynamic_segments("/docs/[...slug]"), vec!["/docs/:slug/*"]);
/// assert_eq!(
///     translate_dynamic_segments("/docs/[[...slug]]"),
///     vec!["/docs", "/docs/*"]
/// );
/// assert_eq!(translate_dynamic_segments("/[[...slug]]"), vec!["/", "/*"]);
/// ```
pub fn translate_dynamic_segments(pattern: &str) -> Vec<String> {
    pattern
        .split('/')
        .fold(TranslateState::default(), process_segment)
        .finalize()
        .into_patterns()
}

/// Derives the function name the platform uses for an API page
///
/// `/api/users/[id]` → `api_users_id-PARAM-handler`. Background functions
/// get a `-background` suffix instead, which the platform keys on.
///
/// ```
/// use nxpack_router::route::function_name_for_page;
///
/// assert_eq!(function_name_for_page("/api/hello", false), "api_hello-handler");
/// assert_eq!(
///     function_name_for_page("/api/[...slug]", true),
///     "api_slug-SPLAT-background"
/// );
/// ```
pub fn function_name_for_page(page: &str, background: bool) -> String {
    let raw = page
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(String::new(), |mut name, segment| {
            match classify_segment(segment) {
                PatternSegmentType::OptionalCatchAll { .. } => name.push_str("-SPLAT"),
                PatternSegmentType::CatchAll { name: param, .. } => {
                    name.push('_');
                    name.push_str(&param);
                    name.push_str("-SPLAT");
                }
                PatternSegmentType::Dynamic { name: param, suffix } => {
                    name.push('_');
                    name.push_str(&param);
                    name.push_str("-PARAM");
                    name.push_str(&suffix);
                }
                PatternSegmentType::Static(seg) => {
                    name.push('/');
                    name.push_str(&seg);
                }
            }
            name
        });

    let sanitized: String = raw
        .trim_start_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "{}-{}",
        sanitized,
        if background { "background" } else { "handler" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_pattern_unchanged() {
        assert_eq!(translate_dynamic_segments("/about"), vec!["/about"]);
        assert_eq!(translate_dynamic_segments("/"), vec!["/"]);
        assert_eq!(translate_dynamic_segments("/cache/*"), vec!["/cache/*"]);
    }

    #[test]
    fn test_multiple_params() {
        assert_eq!(
            translate_dynamic_segments("/shop/[category]/[item]"),
            vec!["/shop/:category/:item"]
        );
    }

    #[test]
    fn test_data_route_keeps_extension() {
        assert_eq!(
            translate_dynamic_segments("/_next/data/build/posts/[id].json"),
            vec!["/_next/data/build/posts/:id.json"]
        );
    }

    #[test]
    fn test_catch_all_absorbs_extension() {
        assert_eq!(
            translate_dynamic_segments("/_next/data/build/docs/[...slug].json"),
            vec!["/_next/data/build/docs/:slug/*"]
        );
    }

    #[test]
    fn test_optional_catch_all_data_route() {
        assert_eq!(
            translate_dynamic_segments("/_next/data/build/docs/[[...slug]].json"),
            vec!["/_next/data/build/docs.json", "/_next/data/build/docs/*"]
        );
    }

    #[test]
    fn test_top_level_optional_catch_all_data_route_uses_index() {
        assert_eq!(
            translate_dynamic_segments("/_next/data/build/[[...slug]].json"),
            vec!["/_next/data/build/index.json", "/_next/data/build/*"]
        );
    }

    #[test]
    fn test_localized_top_level_data_route_is_not_indexed() {
        assert_eq!(
            translate_dynamic_segments("/_next/data/build/fr/[[...slug]].json"),
            vec!["/_next/data/build/fr.json", "/_next/data/build/fr/*"]
        );
    }

    #[test]
    fn test_params_before_optional_catch_all() {
        assert_eq!(
            translate_dynamic_segments("/[lang]/docs/[[...slug]]"),
            vec!["/:lang/docs", "/:lang/docs/*"]
        );
    }

    #[test]
    fn test_function_name_for_page() {
        assert_eq!(
            function_name_for_page("/api/users/[id]", false),
            "api_users_id-PARAM-handler"
        );
        assert_eq!(
            function_name_for_page("/api/files/[[...path]]", false),
            "api_files-SPLAT-handler"
        );
        assert_eq!(
            function_name_for_page("/api/v1.2/status", false),
            "api_v1_2_status-handler"
        );
    }
}
