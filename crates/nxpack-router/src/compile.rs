//! One build, end to end: manifests in, rules, functions and edge
//! declarations out.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use walkdir::WalkDir;

use crate::classify::{classify, Diagnostic, RouteClass};
use crate::config::AdapterConfig;
use crate::edge::{edge_manifest, EdgeManifest};
use crate::manifest::next::BuildOutput;
use crate::pack::{api_lambdas, ApiLambda, ApiRoute};
use crate::rules::{generate_rules, RewriteRule, RuleContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRouting {
    pub rules: Vec<RewriteRule>,
    pub lambdas: Vec<ApiLambda>,
    pub edge: EdgeManifest,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lists every file under `public_dir` as a site path (`/favicon.ico`)
///
/// A missing directory has no files.
pub fn public_files(public_dir: &Path) -> Result<Vec<String>> {
    if !public_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(public_dir).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("failed to walk {}", public_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(public_dir)?;
        let site_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .fold(String::new(), |mut acc, segment| {
                acc.push('/');
                acc.push_str(&segment);
                acc
            });
        files.push(site_path);
    }
    Ok(files)
}

/// Compiles one build
///
/// `api_weights` holds the estimated bundle size of each API route; routes
/// without an estimate weigh nothing.
pub fn compile(
    build: &BuildOutput,
    config: &AdapterConfig,
    api_weights: &HashMap<String, u64>,
    public_files: Vec<String>,
) -> Result<CompiledRouting> {
    let manifest = build.route_manifest(&config.api_kinds);
    let locale = build.locale_config()?;
    let middleware = build.middleware_match_set();

    let classification = classify(&manifest, locale.as_ref(), &middleware)?;

    let api_routes = classification
        .of_class(RouteClass::Api)
        .map(|route| ApiRoute {
            route: route.route.clone(),
            kind: route.api_kind,
            weight: api_weights.get(&route.route).copied().unwrap_or(0),
        })
        .collect();
    let lambdas = api_lambdas(api_routes, config.pack_threshold);

    let ctx = RuleContext {
        base_path: build.base_path().to_string(),
        locale,
        trailing_slash: config.trailing_slash,
        targets: config.targets.clone(),
        api_targets: ApiLambda::targets(&lambdas),
        public_files,
    };
    let rules = generate_rules(&classification, &ctx);
    let edge = edge_manifest(build);

    info!(
        build_id = %build.build_id,
        rules = rules.len(),
        functions = lambdas.len(),
        edge_functions = edge.functions.len(),
        warnings = classification.diagnostics.len(),
        "compiled routing"
    );

    Ok(CompiledRouting {
        rules,
        lambdas,
        edge,
        diagnostics: classification.diagnostics,
    })
}

/// Loads the build named by `config` and compiles it
pub fn compile_project(
    project_dir: &Path,
    config: &AdapterConfig,
    api_weights: &HashMap<String, u64>,
) -> Result<CompiledRouting> {
    let build = BuildOutput::load(project_dir.join(&config.dist_dir))?;
    let files = public_files(&project_dir.join(&config.public_dir))?;
    compile(&build, config, api_weights, files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_public_files_are_site_paths() {
        let dir = std::env::temp_dir().join(format!("nxpack-public-{}", std::process::id()));
        fs::create_dir_all(dir.join("img")).unwrap();
        fs::write(dir.join("robots.txt"), "").unwrap();
        fs::write(dir.join("img").join("logo.png"), "").unwrap();

        let files = public_files(&dir).unwrap();
        assert_eq!(files, vec!["/img/logo.png", "/robots.txt"]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_public_dir() {
        assert!(public_files(Path::new("/nonexistent/public")).unwrap().is_empty());
    }
}
