use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "DEADWOOD";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub access_token: String,

    #[serde(alias = "api_base")]
    pub api_base_url: String,

    /// Empty or absent disables the activity cache.
    #[serde(default)]
    pub cache_file: Option<String>,

    /// Instances whose accounts are never classified (bridges, trusted hosts).
    #[serde(default)]
    pub skip_instances: Vec<String>,

    /// Instances whose accounts count as dead when they cannot be reached.
    #[serde(default)]
    pub assume_dead_instances: Vec<String>,
}

impl AppConfig {
    /// Layering: `.env`, then the config file, then `DEADWOOD_*` variables.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        // 1. Try standard dotenv discovery from current dir
        if dotenvy::dotenv().is_err() {
            // 2. Fallback: the app root
            let path = crate::path_utils::get_app_root().join(".env");
            if path.exists() {
                let _ = dotenvy::from_path(&path);
            }
        }

        Self::layered(file, None)
    }

    /// `env` replaces the process environment when given.
    fn layered(file: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let builder = match file {
            Some(path) => Config::builder().add_source(File::from(path).required(true)),
            None => Config::builder().add_source(File::with_name("deadwood").required(false)),
        };

        let env = Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("skip_instances")
            .with_list_parse_key("assume_dead_instances")
            .source(env);

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token.trim().is_empty() {
            return Err(ConfigError::Message("access_token is empty".to_string()));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Message("api_base_url is empty".to_string()));
        }
        Ok(())
    }

    /// Location of the activity cache, `None` when caching is disabled.
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache_file
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(crate::path_utils::get_path)
    }

    pub fn instance_policy(&self) -> InstancePolicy {
        InstancePolicy::new(&self.skip_instances, &self.assume_dead_instances)
    }
}

/// Per-instance overrides applied before and after account lookups.
#[derive(Debug, Clone, Default)]
pub struct InstancePolicy {
    skip: HashSet<String>,
    assume_dead: HashSet<String>,
}

impl InstancePolicy {
    pub fn new<S: AsRef<str>>(skip: &[S], assume_dead: &[S]) -> Self {
        Self {
            skip: normalize(skip),
            assume_dead: normalize(assume_dead),
        }
    }

    /// Local accounts (no instance) are never skipped.
    pub fn skips(&self, instance: Option<&str>) -> bool {
        instance.is_some_and(|i| self.skip.contains(&i.to_lowercase()))
    }

    pub fn assumes_dead(&self, instance: Option<&str>) -> bool {
        instance.is_some_and(|i| self.assume_dead.contains(&i.to_lowercase()))
    }
}

fn normalize<S: AsRef<str>>(domains: &[S]) -> HashSet<String> {
    domains
        .iter()
        .map(|d| d.as_ref().trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}
