//! Environment and pipeline configuration
//!
//! Environment files are loaded from the canonical location
//! `/etc/aeo/environment` (or `.env` during development), then
//! [`OrchestratorConfig`] is layered from defaults, an optional TOML file,
//! and `AEO_*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use aeo_core::config::{load_environment, OrchestratorConfig};
//!
//! load_environment();
//! let config = OrchestratorConfig::load(None).expect("valid configuration");
//! ```

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Alternative paths to check (in order of priority)
pub const ENV_FILE_PATHS: &[&str] = &["/etc/aeo/environment", "/etc/aeo.env", ".env"];

/// Load environment variables from the canonical configuration file.
///
/// `AEO_ENV_FILE` takes precedence over [`ENV_FILE_PATHS`]. Existing
/// variables are never overridden. Returns the path that was loaded.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var("AEO_ENV_FILE") {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = try_load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

fn try_load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);
    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some((key, value)) = parse_env_line(line) {
                    if std::env::var(&key).is_err() {
                        std::env::set_var(&key, &value);
                        loaded_count += 1;
                    } else {
                        skipped_count += 1;
                        debug!("Skipped (already set): {}", key);
                    }
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );
            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

/// Parse `KEY=VALUE`, `KEY="VALUE"` or `KEY='VALUE'`
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Get a configuration value with a default.
pub fn get_config(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an optional, non-empty configuration value.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get a boolean configuration value (`true`, `1`, `yes`, `on`).
pub fn get_config_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(default)
}

/// Get an integer configuration value.
pub fn get_config_int(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Settings for one orchestrator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Token budget for the in-memory summary set
    pub context_token_limit: usize,
    /// Fraction of the budget above which the context counts as near its limit
    pub compression_threshold: f64,
    /// Share of the oldest completed summaries rewritten per compression
    pub compression_fraction: f64,
    /// Compression is skipped below this many completed summaries
    pub compression_min_completed: usize,
    /// Per-agent deadline in seconds (0 disables)
    pub agent_timeout_secs: u64,
    /// Upper bound on concurrently running agents in a parallel phase
    pub max_parallel_agents: usize,
    /// How many times the reasoner may trigger a new plan
    pub max_replans: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            context_token_limit: 100_000,
            compression_threshold: 0.8,
            compression_fraction: 0.3,
            compression_min_completed: 6,
            agent_timeout_secs: 300,
            max_parallel_agents: 8,
            max_replans: 1,
        }
    }
}

impl OrchestratorConfig {
    /// Layer defaults, an optional config file and `AEO_*` variables.
    ///
    /// `AEO_AGENT_TIMEOUT_SECS=60` overrides `agent_timeout_secs`.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix("AEO").try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Equivalent to `load(None)`
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> Result<()> {
        if self.context_token_limit == 0 {
            return Err(Error::Config("context_token_limit must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.compression_threshold) {
            return Err(Error::Config(format!(
                "compression_threshold must be within [0, 1], got {}",
                self.compression_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.compression_fraction) {
            return Err(Error::Config(format!(
                "compression_fraction must be within [0, 1], got {}",
                self.compression_fraction
            )));
        }
        if self.max_parallel_agents == 0 {
            return Err(Error::Config("max_parallel_agents must be at least 1".into()));
        }
        Ok(())
    }

    /// Per-agent deadline, `None` when disabled
    pub fn agent_timeout(&self) -> Option<Duration> {
        (self.agent_timeout_secs > 0).then(|| Duration::from_secs(self.agent_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_env_line_simple() {
        let (k, v) = parse_env_line("FOO=bar").unwrap();
        assert_eq!(k, "FOO");
        assert_eq!(v, "bar");
    }

    #[test]
    fn test_parse_env_line_quoted() {
        let (k, v) = parse_env_line("export FOO=\"bar baz\"").unwrap();
        assert_eq!(k, "FOO");
        assert_eq!(v, "bar baz");

        let (_, v) = parse_env_line("FOO='bar'").unwrap();
        assert_eq!(v, "bar");
    }

    #[test]
    fn test_parse_env_line_empty() {
        assert!(parse_env_line("").is_none());
        assert!(parse_env_line("=value").is_none());
    }

    #[test]
    fn test_get_config_bool() {
        std::env::set_var("AEO_TEST_FLAG_ON", "Yes");
        std::env::set_var("AEO_TEST_FLAG_OFF", "0");
        assert!(get_config_bool("AEO_TEST_FLAG_ON", false));
        assert!(!get_config_bool("AEO_TEST_FLAG_OFF", true));
        assert!(get_config_bool("AEO_TEST_FLAG_UNSET", true));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestratorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.agent_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = OrchestratorConfig {
            agent_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.agent_timeout().is_none());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "context_token_limit = 2000\nmax_parallel_agents = 2").unwrap();

        let config = OrchestratorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.context_token_limit, 2000);
        assert_eq!(config.max_parallel_agents, 2);
        assert_eq!(config.compression_fraction, 0.3);
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let config = OrchestratorConfig {
            compression_fraction: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
