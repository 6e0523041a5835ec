//! Loader for delve configuration with YAML + environment overlays.
//!
//! Sources merge in this order, later winning:
//!
//! 1. files / inline YAML, in the order they were added
//! 2. `DELVE__`-prefixed environment variables, `__` separating sections
//!    (`DELVE__SEARCH__MAX_SOURCES=3`)
//!
//! After merging, `${VAR}` placeholders in string values are expanded from
//! the process environment (nested references resolve up to a fixed depth)
//! and the tree is deserialized into [`DelveConfig`].
use config::{Config, ConfigError, Environment, File};
use serde_json::Value;
use std::path::{Path, PathBuf};

mod provider;
mod settings;

pub use provider::{ConfigProvider, FileConfigProvider, StaticConfigProvider};
pub use settings::{
    DelveConfig, InferenceSettings, LoggingSettings, PromptPreset, PromptSettings,
    ResearchSettings, SearchSettings, SubstitutionSettings,
};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "DELVE";
/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "delve.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error(transparent)]
    Source(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigLoadError> for delve_common::DelveError {
    fn from(e: ConfigLoadError) -> Self {
        delve_common::DelveError::Config(e.to_string())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// `./delve.yaml` if present, else `<config dir>/delve/delve.yaml` if present.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|d| d.join("delve").join(CONFIG_FILE_NAME))
        .filter(|p| p.is_file())
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct DelveConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for DelveConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DelveConfigLoader {
    /// No file sources yet; environment overrides are always applied last.
    ///
    /// ```
    /// use delve_config::DelveConfigLoader;
    ///
    /// let config = DelveConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nsearch: { max_sources: 3 }")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.search.max_sources, 3);
    /// assert_eq!(config.inference.max_retries, 3);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`Self::with_file`] but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use delve_config::{DelveConfigLoader, PromptPreset};
    ///
    /// let cfg = DelveConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// research:
    ///   prompts:
    ///     preset: nosql
    ///     summary: "Summarize: {findings}"
    ///   require_sources: true
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.research.prompts.preset, PromptPreset::Nosql);
    /// assert!(cfg.research.require_sources);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use delve_config::DelveConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCTEST_HF_TOKEN", "hf_from_env"); }
    ///
    /// let config = DelveConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// credentials:
    ///   model_token: "${DOCTEST_HF_TOKEN}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.credentials.model_token, "hf_from_env");
    ///
    /// unsafe { std::env::remove_var("DOCTEST_HF_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<DelveConfig, ConfigLoadError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: DelveConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate().map_err(ConfigLoadError::Invalid)?;

        Ok(typed)
    }
}
