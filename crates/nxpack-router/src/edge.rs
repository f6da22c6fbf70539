//! Edge function declarations
//!
//! Middleware and edge-runtime pages run on the platform's edge, which
//! matches requests with its own regex engine. Their Next.js matchers are
//! translated with [`crate::dialect`] before being declared.

use serde::Serialize;
use tracing::warn;

use crate::dialect::{
    make_locale_segment_optional, rewrite_named_capture_groups, strip_lookahead_assertions,
};
use crate::manifest::next::{BuildOutput, MiddlewareManifest, RoutesManifest};

pub const MIDDLEWARE_DISPLAY_NAME: &str = "Next.js Middleware Handler";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeFunctionDeclaration {
    pub function: String,
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeManifest {
    pub functions: Vec<EdgeFunctionDeclaration>,
    pub version: u8,
}

/// `middleware` → `next_middleware`, `pages/api/edge` → `next_pages_api_edge`
pub fn sanitize_function_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("next_{}", sanitized)
}

fn edge_pattern(regex: &str) -> String {
    rewrite_named_capture_groups(&strip_lookahead_assertions(regex))
}

/// One declaration per middleware matcher, in `sortedMiddleware` order
///
/// Middleware matchers carry a mandatory locale prefix; it is made optional
/// first, while the generation literals (lookahead included) still match.
pub fn middleware_declarations(manifest: &MiddlewareManifest) -> Vec<EdgeFunctionDeclaration> {
    manifest
        .sorted_middleware
        .iter()
        .filter_map(|page| {
            let definition = manifest.middleware.get(page);
            if definition.is_none() {
                warn!(%page, "middleware listed in sortedMiddleware has no definition");
            }
            definition
        })
        .flat_map(|definition| {
            let function = sanitize_function_name(&definition.name);
            definition
                .matcher_regexps()
                .into_iter()
                .map(move |regexp| EdgeFunctionDeclaration {
                    function: function.clone(),
                    name: MIDDLEWARE_DISPLAY_NAME.to_string(),
                    pattern: edge_pattern(&make_locale_segment_optional(regexp)),
                })
        })
        .collect()
}

/// One declaration per edge-runtime page
///
/// The page regex from the routes manifest is preferred over the function's
/// own matcher because it accepts a trailing slash.
pub fn function_declarations(
    manifest: &MiddlewareManifest,
    routes: &RoutesManifest,
) -> Vec<EdgeFunctionDeclaration> {
    manifest
        .functions
        .iter()
        .filter_map(|(_, definition)| {
            let source = routes
                .page_regex(&definition.page)
                .or_else(|| definition.matcher_regexps().first().copied());
            match source {
                Some(regex) => Some(EdgeFunctionDeclaration {
                    function: sanitize_function_name(&definition.name),
                    name: definition.page.clone(),
                    pattern: edge_pattern(regex).replace("(?:/)?$", "/?$"),
                }),
                None => {
                    warn!(page = %definition.page, "edge function has no matcher, skipping");
                    None
                }
            }
        })
        .collect()
}

pub fn edge_manifest(build: &BuildOutput) -> EdgeManifest {
    let mut functions = middleware_declarations(&build.middleware);
    functions.extend(function_declarations(&build.middleware, &build.routes));
    EdgeManifest {
        functions,
        version: 1,
    }
}
