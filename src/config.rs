//! Runtime configuration
//!
//! Defaults, then an optional TOML file, then `USERSEARCH_*` environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default search API
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default search endpoint, relative to the API base
pub const DEFAULT_SEARCH_PATH: &str = "/search/users";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub search_path: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Upper bound on avatar downloads in flight; `None` means unbounded.
    pub max_concurrent_fetches: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            search_path: DEFAULT_SEARCH_PATH.to_string(),
            timeout_ms: 10_000,
            user_agent: format!("usersearch/{}", env!("CARGO_PKG_VERSION")),
            max_concurrent_fetches: None,
        }
    }
}

impl Config {
    /// Default config file location (`~/.config/usersearch/config.toml` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("usersearch").join("config.toml"))
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(base) = lookup("USERSEARCH_API_BASE") {
            self.api_base = base;
        }
        if let Some(raw) = lookup("USERSEARCH_TIMEOUT_MS") {
            self.timeout_ms = parse_env("USERSEARCH_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("USERSEARCH_MAX_FETCHES") {
            self.max_concurrent_fetches = Some(parse_env("USERSEARCH_MAX_FETCHES", &raw)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(invalid(format!("api_base must be an http(s) URL, got {:?}", self.api_base)));
        }
        if !self.search_path.starts_with('/') {
            return Err(invalid(format!("search_path must start with '/', got {:?}", self.search_path)));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeout_ms must be greater than zero".to_string()));
        }
        if self.max_concurrent_fetches == Some(0) {
            return Err(invalid("max_concurrent_fetches must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Full search endpoint URL
    pub fn search_url(&self) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), self.search_path)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| invalid(format!("{}={:?}: {}", key, raw, e)))
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid { message }
}
