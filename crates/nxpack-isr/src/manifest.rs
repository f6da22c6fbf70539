//! Frozen copy of the prerender manifest
//!
//! Taken once when a server instance starts. The framework may mutate its
//! own manifest object while serving; resolution must not see that.

use nxpack_router::dialect::strip_lookahead_assertions;
use nxpack_router::manifest::next::PrerenderManifest;
use nxpack_router::manifest::{Fallback, OrderedMap};
use regex::Regex;
use tracing::warn;

/// A dynamic route as the resolver sees it
#[derive(Debug, Clone)]
pub struct DynamicEntry {
    pub page: String,
    pub regex: Regex,
    /// Data route with `[param]` tokens, e.g. `/_next/data/b1/posts/[id].json`
    pub data_template: String,
    pub fallback: Fallback,
}

#[derive(Debug, Clone, Default)]
pub struct RevalidationManifest {
    static_routes: OrderedMap<String>,
    dynamic_routes: Vec<DynamicEntry>,
    preview_mode_id: Option<String>,
}

/// Compiles a manifest regex; the `regex` crate has no lookahead, so a
/// rejected pattern is retried without it. The retried pattern matches a
/// superset of the original, which is logged.
fn compile_route_regex(page: &str, source: &str) -> Option<Regex> {
    match Regex::new(source) {
        Ok(regex) => Some(regex),
        Err(_) => {
            let stripped = strip_lookahead_assertions(source);
            match Regex::new(&stripped) {
                Ok(regex) => {
                    warn!(
                        %page,
                        regex = %source,
                        widened = %stripped,
                        "route regex widened by removing lookahead"
                    );
                    Some(regex)
                }
                Err(error) => {
                    warn!(
                        %page,
                        regex = %source,
                        %error,
                        "skipping dynamic route with unsupported regex"
                    );
                    None
                }
            }
        }
    }
}

impl RevalidationManifest {
    /// Deep-copies what resolution needs out of `prerender`
    pub fn snapshot(prerender: &PrerenderManifest) -> Self {
        let static_routes = prerender
            .routes
            .iter()
            .filter_map(|(path, route)| {
                route
                    .data_route
                    .as_ref()
                    .map(|data| (path.to_string(), data.clone()))
            })
            .collect();

        let dynamic_routes = prerender
            .dynamic_routes
            .iter()
            .filter_map(|(page, route)| {
                let data_template = route.data_route.clone()?;
                let regex = compile_route_regex(page, &route.route_regex)?;
                Some(DynamicEntry {
                    page: page.to_string(),
                    regex,
                    data_template,
                    fallback: route.fallback,
                })
            })
            .collect();

        Self {
            static_routes,
            dynamic_routes,
            preview_mode_id: prerender.preview.as_ref().map(|p| p.preview_mode_id.clone()),
        }
    }

    pub fn static_data_route(&self, path: &str) -> Option<&str> {
        self.static_routes.get(path).map(String::as_str)
    }

    /// Dynamic routes in manifest order
    pub fn dynamic_routes(&self) -> &[DynamicEntry] {
        &self.dynamic_routes
    }

    pub fn preview_mode_id(&self) -> Option<&str> {
        self.preview_mode_id.as_deref()
    }
}
