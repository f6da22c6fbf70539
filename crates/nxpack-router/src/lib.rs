//! # nxpack Router
//!
//! Compiles a Next.js build into what a hosting platform needs to serve it:
//! - Ordered rewrite rules (first match wins)
//! - API function groupings under a size ceiling
//! - Edge function declarations for middleware
//!
//! ## Pipeline
//!
//! - **manifest**: read `.next/` manifests into [`RouteManifest`]
//! - **classify**: one [`RouteClass`] per route and locale form
//! - **rules**: classification → ordered [`RewriteRule`] list
//! - **pack**: API routes → deployable functions
//! - **edge**: middleware matchers → platform regex dialect
//!
//! Everything here is pure and synchronous except loading files.
//!
//! ## Example
//!
//! ```
//! use nxpack_router::{classify, generate_rules, MiddlewareMatchSet, RouteEntry, RouteManifest, RuleContext};
//! use nxpack_router::manifest::Revalidate;
//!
//! let manifest = RouteManifest::new(vec![
//!     RouteEntry::page("/about").with_revalidate(Revalidate::Seconds(300)),
//!     RouteEntry::page("/posts/[id]"),
//! ]);
//! let classification = classify(&manifest, None, &MiddlewareMatchSet::default()).unwrap();
//! let rules = generate_rules(&classification, &RuleContext::default());
//!
//! assert!(rules.iter().any(|r| r.from == "/posts/:id"));
//! assert_eq!(rules.last().unwrap().from, "/*");
//! ```

pub mod classify;
pub mod compile;
pub mod config;
pub mod dialect;
pub mod edge;
pub mod manifest;
pub mod pack;
pub mod path;
pub mod route;
pub mod rules;

pub use classify::{
    classify, Classification, ClassifiedRoute, ClassifyError, Diagnostic, LocaleVariant,
    RouteClass, MINIMUM_REVALIDATE_SECONDS,
};
pub use compile::{compile, compile_project, CompiledRouting};
pub use config::{AdapterConfig, AdapterTomlConfig, ConfigCache};
pub use manifest::{
    ApiKind, Fallback, LocaleConfig, LocaleError, MiddlewareMatchSet, Revalidate, RouteEntry,
    RouteManifest,
};
pub use pack::{api_lambdas, pack, ApiLambda, WeightedItem};
pub use rules::{generate_rules, Condition, FunctionTargets, RewriteRule, RuleContext};
