//! Revalidation configuration types

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.netlify.com/api/v1";

/// Runtime configuration of the invalidation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidateConfig {
    /// Platform API root, without trailing slash
    pub api_url: String,

    pub site_id: String,

    /// Bearer token for the platform API
    pub token: String,

    /// Caller-side limit on one invalidation call
    pub timeout: Option<Duration>,
}

impl RevalidateConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/sites/{}/refresh_on_demand_builders",
            self.api_url.trim_end_matches('/'),
            self.site_id
        )
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_site_id_env() -> String {
    "SITE_ID".to_string()
}

fn default_token_env() -> String {
    "NETLIFY_API_TOKEN".to_string()
}

/// TOML configuration, the `[revalidate]` table of nxpack.toml
///
/// Credentials are never written to the file; it names the environment
/// variables holding them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidateTomlConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Explicit site id; falls back to `site_id_env`
    #[serde(default)]
    pub site_id: Option<String>,

    #[serde(default = "default_site_id_env")]
    pub site_id_env: String,

    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for RevalidateTomlConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            site_id: None,
            site_id_env: default_site_id_env(),
            token_env: default_token_env(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    revalidate: RevalidateTomlConfig,
}

impl RevalidateTomlConfig {
    /// Reads the `[revalidate]` table; a missing table yields defaults
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = toml::from_str(raw).context("invalid [revalidate] configuration")?;
        Ok(file.revalidate)
    }

    /// Convert TOML config to runtime config, reading credentials from the
    /// process environment
    pub fn to_runtime_config(&self) -> anyhow::Result<RevalidateConfig> {
        self.to_runtime_config_with(|name| std::env::var(name).ok())
    }

    /// Like [`Self::to_runtime_config`] with an explicit variable lookup
    pub fn to_runtime_config_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<RevalidateConfig> {
        let site_id = match &self.site_id {
            Some(id) => id.clone(),
            None => env(&self.site_id_env).ok_or_else(|| {
                anyhow::anyhow!("revalidation requires a site id in ${}", self.site_id_env)
            })?,
        };
        let token = env(&self.token_env).ok_or_else(|| {
            anyhow::anyhow!("revalidation requires an API token in ${}", self.token_env)
        })?;

        Ok(RevalidateConfig {
            api_url: self.api_url.clone(),
            site_id,
            token,
            timeout: self.timeout_secs.map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_from_environment() {
        let config = RevalidateTomlConfig::default()
            .to_runtime_config_with(env(&[("SITE_ID", "site-1"), ("NETLIFY_API_TOKEN", "tok")]))
            .unwrap();
        assert_eq!(
            config.endpoint(),
            "https://api.netlify.com/api/v1/sites/site-1/refresh_on_demand_builders"
        );
        assert_eq!(config.token, "tok");
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let err = RevalidateTomlConfig::default()
            .to_runtime_config_with(env(&[("SITE_ID", "site-1")]))
            .unwrap_err();
        assert!(err.to_string().contains("NETLIFY_API_TOKEN"));
    }

    #[test]
    fn test_from_toml_table() {
        let toml_config = RevalidateTomlConfig::from_toml(
            r#"
            [routing]
            trailing_slash = true

            [revalidate]
            api_url = "http://localhost:8080/api/v1/"
            site_id = "local"
            token_env = "LOCAL_TOKEN"
            timeout_secs = 5
            "#,
        )
        .unwrap();
        let config = toml_config
            .to_runtime_config_with(env(&[("LOCAL_TOKEN", "t")]))
            .unwrap();
        assert_eq!(
            config.endpoint(),
            "http://localhost:8080/api/v1/sites/local/refresh_on_demand_builders"
        );
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_from_toml_without_table() {
        assert_eq!(
            RevalidateTomlConfig::from_toml("").unwrap(),
            RevalidateTomlConfig::default()
        );
    }
}
