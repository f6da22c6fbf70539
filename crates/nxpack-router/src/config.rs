//! Adapter configuration (`nxpack.toml`)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::manifest::next::is_api_page;
use crate::manifest::ApiKind;
use crate::pack::default_threshold;
use crate::rules::{FunctionTargets, HANDLER_FUNCTION, ODB_FUNCTION};

pub const CONFIG_FILE: &str = "nxpack.toml";

/// Adapter configuration used by a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Next.js dist directory (`.next`)
    pub dist_dir: PathBuf,

    /// Directory whose files stay reachable in preview mode
    pub public_dir: PathBuf,

    pub trailing_slash: bool,

    pub targets: FunctionTargets,

    /// Bin packing threshold for API functions, in bytes
    pub pack_threshold: u64,

    /// Non-standard API routes, keyed by page
    pub api_kinds: HashMap<String, ApiKind>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            dist_dir: default_dist_dir(),
            public_dir: default_public_dir(),
            trailing_slash: false,
            targets: FunctionTargets::default(),
            pack_threshold: default_threshold(0),
            api_kinds: HashMap::new(),
        }
    }
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from(".next")
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_handler() -> String {
    HANDLER_FUNCTION.to_string()
}

fn default_builder() -> String {
    ODB_FUNCTION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTomlConfig {
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

impl Default for BuildTomlConfig {
    fn default() -> Self {
        Self {
            dist_dir: default_dist_dir(),
            public_dir: default_public_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTomlConfig {
    #[serde(default)]
    pub trailing_slash: bool,

    /// Rewrite target of the always-server-rendered function
    #[serde(default = "default_handler")]
    pub handler: String,

    /// Rewrite target of the on-demand builder
    #[serde(default = "default_builder")]
    pub builder: String,
}

impl Default for RoutingTomlConfig {
    fn default() -> Self {
        Self {
            trailing_slash: false,
            handler: default_handler(),
            builder: default_builder(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionsTomlConfig {
    /// Size of the code every function bundles, subtracted from the limit
    #[serde(default)]
    pub common_dependency_size: u64,

    /// Explicit packing threshold; overrides the derived one
    #[serde(default)]
    pub threshold: Option<u64>,
}

/// TOML configuration for nxpack.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterTomlConfig {
    #[serde(default)]
    pub build: BuildTomlConfig,

    #[serde(default)]
    pub routing: RoutingTomlConfig,

    #[serde(default)]
    pub functions: FunctionsTomlConfig,

    /// `"/api/cron" = "scheduled"`
    #[serde(default)]
    pub api: HashMap<String, ApiKind>,
}

impl AdapterTomlConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Convert TOML config to runtime config
    pub fn to_runtime_config(&self) -> Result<AdapterConfig> {
        for target in [&self.routing.handler, &self.routing.builder] {
            if !target.starts_with('/') {
                bail!("rewrite target {:?} must be an absolute path", target);
            }
        }
        if let Some(page) = self.api.keys().find(|page| !is_api_page(page)) {
            bail!("[api] entry {:?} is not an API route", page);
        }

        let pack_threshold = self
            .functions
            .threshold
            .unwrap_or_else(|| default_threshold(self.functions.common_dependency_size));

        Ok(AdapterConfig {
            dist_dir: self.build.dist_dir.clone(),
            public_dir: self.build.public_dir.clone(),
            trailing_slash: self.routing.trailing_slash,
            targets: FunctionTargets {
                server: self.routing.handler.clone(),
                builder: self.routing.builder.clone(),
            },
            pack_threshold,
            api_kinds: self.api.clone(),
        })
    }
}

/// Loads `nxpack.toml` once and hands out the result until invalidated
///
/// A missing file yields the default configuration.
#[derive(Debug)]
pub struct ConfigCache {
    path: PathBuf,
    cached: RwLock<Option<Arc<AdapterConfig>>>,
}

impl ConfigCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    /// Cache for `nxpack.toml` inside `project_dir`
    pub fn for_project(project_dir: impl AsRef<Path>) -> Self {
        Self::new(project_dir.as_ref().join(CONFIG_FILE))
    }

    pub fn get(&self) -> Result<Arc<AdapterConfig>> {
        if let Some(config) = self
            .cached
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
        {
            return Ok(Arc::clone(config));
        }

        let config = Arc::new(self.load()?);
        *self
            .cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Drops the cached value; the next `get` reads the file again
    pub fn invalidate(&self) {
        *self
            .cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn load(&self) -> Result<AdapterConfig> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no adapter config, using defaults");
            return Ok(AdapterConfig::default());
        }
        AdapterTomlConfig::from_file(&self.path)?.to_runtime_config()
    }
}
