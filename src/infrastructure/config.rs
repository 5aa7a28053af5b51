//! Configuration file support.
//!
//! Everything has a default, so a missing file or a file that sets only a
//! few keys is fine:
//!
//! ```toml
//! [engine]
//! cache_capacity = 1024
//! max_expression_depth = 128
//! step_budget = 100000
//! max_call_depth = 64
//!
//! [format]
//! lower_exp = -9
//! upper_exp = 15
//!
//! [currency]
//! enabled = true
//! url = "https://api.exchangeratesapi.io/latest"
//! ttl_days = 7
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{EngineConfig, FormatConfig};

pub const DEFAULT_RATES_URL: &str = "https://api.exchangeratesapi.io/latest";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub enabled: bool,
    pub url: String,
    /// Where fetched rates are cached; a per-user cache directory if unset.
    pub cache_file: Option<PathBuf>,
    pub ttl_days: u64,
    pub timeout_secs: u64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_RATES_URL.to_string(),
            cache_file: None,
            ttl_days: 7,
            timeout_secs: 10,
        }
    }
}

impl CurrencyConfig {
    pub fn cache_path(&self) -> PathBuf {
        self.cache_file.clone().unwrap_or_else(default_cache_path)
    }
}

/// `$HOME/.cache/mathpad/rates.json`, or a file in the temp directory.
pub fn default_cache_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".cache").join("mathpad").join("rates.json"),
        None => std::env::temp_dir().join("mathpad-rates.json"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub format: FormatConfig,
    pub currency: CurrencyConfig,
}

impl Config {
    /// Reads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let Some(path) = path else {
            return Ok(Config::default());
        };

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.engine.cache_capacity, 1024);
        assert_eq!(config.engine.step_budget, 100_000);
        assert_eq!(config.format.lower_exp, -9);
        assert_eq!(config.format.upper_exp, 15);
        assert!(config.currency.enabled);
        assert_eq!(config.currency.url, DEFAULT_RATES_URL);
        assert_eq!(config.currency.ttl_days, 7);
    }

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nmax_call_depth = 8\n\n[currency]\nenabled = false").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.max_call_depth, 8);
        assert_eq!(config.engine.cache_capacity, 1024);
        assert!(!config.currency.enabled);
        assert_eq!(config.format, FormatConfig::default());
    }

    #[test]
    fn test_errors_name_the_file() {
        let missing = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nstep_budget = \"lots\"").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_cache_path_override() {
        let config = CurrencyConfig {
            cache_file: Some(PathBuf::from("/tmp/rates.json")),
            ..CurrencyConfig::default()
        };
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/rates.json"));
        assert!(CurrencyConfig::default().cache_path().ends_with("rates.json")
            || CurrencyConfig::default().cache_path().ends_with("mathpad-rates.json"));
    }
}
