//! Configuration file parsing and structures.
//!
//! verlichting uses a single TOML file describing the controller to talk to
//! and, per entity category, the ordered list of entities to expose.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

use crate::allowlist::AllowList;
use crate::catalog::Catalog;
use crate::catalog::EntityCategory;
use crate::catalog::SceneCatalog;
use crate::catalog::SwitchCatalog;
use crate::entity::SceneMode;
use crate::routing::DomainPolicy;
use crate::routing::ServiceDomain;

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub scenes: ScenesConfig,
    #[serde(default)]
    pub switches: SwitchableConfig,
    #[serde(default)]
    pub lights: SwitchableConfig,
    #[serde(default)]
    pub states: SwitchableConfig,
}

#[derive(
    Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"verlichting::upstream" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build a target filter with `level` as default and the overrides applied.
    pub fn targets(&self, level: LogLevel) -> Targets {
        Targets::new()
            .with_default(LevelFilter::from(level))
            .with_targets(
                self.overrides
                    .iter()
                    .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
            )
    }
}

/// Address the HTTP API listens on
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3123
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
        }
    }
}

/// The home-automation controller
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL, e.g. "http://homeassistant.local:8123"
    pub url: String,

    /// Long-lived access token. Takes precedence over `token_env`.
    #[serde(default)]
    pub token: Option<String>,

    /// Environment variable holding the token (default: API_TOKEN)
    #[serde(default)]
    pub token_env: Option<String>,

    /// Timeout for every controller request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

impl UpstreamConfig {
    const DEFAULT_TOKEN_ENV: &'static str = "API_TOKEN";

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the access token from the file or the environment.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        let token_env = self.token_env.as_deref().unwrap_or(Self::DEFAULT_TOKEN_ENV);

        let token = match &self.token {
            Some(token) => token.clone(),
            None => std::env::var(token_env).unwrap_or_default(),
        };

        let token = token.trim();
        if token.is_empty() {
            return Err(ConfigError::MissingToken(token_env.to_string()));
        }

        Ok(token.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScenesConfig {
    /// "script" or "scene"
    #[serde(default)]
    pub mode: SceneMode,

    #[serde(default)]
    pub allow: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SwitchableConfig {
    #[serde(default)]
    pub allow: Vec<String>,

    /// A service domain, or "infer" to use each entity's own domain.
    /// Defaults depend on the category.
    #[serde(default)]
    pub domain: Option<DomainPolicy>,
}

impl SwitchableConfig {
    fn catalog(
        &self,
        category: EntityCategory,
        default: DomainPolicy,
    ) -> Result<SwitchCatalog, ConfigError> {
        let allow = AllowList::new(self.allow.iter().cloned())
            .map_err(|e| ConfigError::invalid(category, e))?;

        SwitchCatalog::new(allow, self.domain.unwrap_or(default))
            .map_err(|e| ConfigError::invalid(category, e))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Validate the allow-lists and resolve command routing.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        let scene_allow = AllowList::new(self.scenes.allow.iter().cloned())
            .map_err(|e| ConfigError::invalid(EntityCategory::Scenes, e))?;
        let scenes = SceneCatalog::new(scene_allow, self.scenes.mode)
            .map_err(|e| ConfigError::invalid(EntityCategory::Scenes, e))?;

        Ok(Catalog {
            scenes,
            switches: self.switches.catalog(
                EntityCategory::Switches,
                DomainPolicy::Fixed(ServiceDomain::Switch),
            )?,
            lights: self
                .lights
                .catalog(EntityCategory::Lights, DomainPolicy::Infer)?,
            states: self.states.catalog(
                EntityCategory::States,
                DomainPolicy::Fixed(ServiceDomain::InputBoolean),
            )?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid [{section}] section: {message}")]
    Invalid { section: String, message: String },

    #[error("No upstream token configured (set upstream.token or the {0} environment variable)")]
    MissingToken(String),
}

impl ConfigError {
    fn invalid(category: EntityCategory, err: impl std::fmt::Display) -> Self {
        ConfigError::Invalid {
            section: category.to_string(),
            message: err.to_string(),
        }
    }
}
