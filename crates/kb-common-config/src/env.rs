//! Environment variable handling.

use crate::types::GatewayConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("failed to load {path}: {source}")]
    DotenvError {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
}

/// Environment variable names.
pub mod vars {
    // Transport
    pub const KB_HTTP_TIMEOUT: &str = "KB_HTTP_TIMEOUT";
    pub const KB_CONNECT_TIMEOUT: &str = "KB_CONNECT_TIMEOUT";
    pub const KB_USER_AGENT: &str = "KB_USER_AGENT";

    // Retry
    pub const KB_MAX_RETRIES: &str = "KB_MAX_RETRIES";
    pub const KB_RETRY_BASE_DELAY: &str = "KB_RETRY_BASE_DELAY";
    pub const KB_RETRY_MAX_DELAY: &str = "KB_RETRY_MAX_DELAY";

    // Cache
    pub const KB_CACHE_ENABLED: &str = "KB_CACHE_ENABLED";
    pub const KB_CACHE_TTL: &str = "KB_CACHE_TTL";
    pub const KB_CACHE_MAX_SIZE: &str = "KB_CACHE_MAX_SIZE";

    // Files
    pub const KB_CONFIG_PATH: &str = "KB_CONFIG_PATH";
    pub const KB_ENV: &str = "KB_ENV";
}

/// Environment access.
pub struct Environment;

impl Environment {
    /// Load `.env`, `.env.local` and `.env.{KB_ENV}` from the working directory.
    pub fn init() -> Result<Vec<PathBuf>, EnvError> {
        Self::init_in(".")
    }

    /// Load `.env` files from `dir` into the process environment.
    ///
    /// A variable already set, by the process or an earlier file, is never
    /// replaced. Missing files are skipped. Returns the files that were loaded.
    pub fn init_in(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, EnvError> {
        let dir = dir.as_ref();
        let mut names = vec![".env".to_string(), ".env.local".to_string()];
        if let Ok(name) = env::var(vars::KB_ENV) {
            names.push(format!(".env.{name}"));
        }

        let mut loaded = Vec::new();
        for name in names {
            let path = dir.join(name);
            match dotenvy::from_path(&path) {
                Ok(()) => loaded.push(path),
                Err(e) if e.not_found() => {}
                Err(source) => {
                    return Err(EnvError::DotenvError {
                        path: path.display().to_string(),
                        source,
                    })
                }
            }
        }

        if !loaded.is_empty() {
            tracing::debug!(files = ?loaded, "Loaded .env files");
        }
        Ok(loaded)
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }
}

fn parse_bool(value: Option<String>) -> Option<bool> {
    value.map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn parse_value<T: FromStr>(var: &str, value: Option<String>) -> Result<Option<T>, EnvError> {
    match value {
        Some(v) => v.trim().parse().map(Some).map_err(|_| EnvError::InvalidValue {
            var: var.to_string(),
            message: format!("cannot parse {v:?}"),
        }),
        None => Ok(None),
    }
}

fn parse_secs(var: &str, value: Option<String>) -> Result<Option<f64>, EnvError> {
    match parse_value::<f64>(var, value)? {
        Some(v) if !v.is_finite() || v < 0.0 => Err(EnvError::InvalidValue {
            var: var.to_string(),
            message: "expected a non-negative number of seconds".to_string(),
        }),
        other => Ok(other),
    }
}

impl GatewayConfig {
    /// Override fields from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secs = |var: &str| parse_secs(var, lookup(var));

        if let Some(v) = secs(vars::KB_HTTP_TIMEOUT)? {
            self.http.timeout_secs = v;
        }
        if let Some(v) = secs(vars::KB_CONNECT_TIMEOUT)? {
            self.http.connect_timeout_secs = v;
        }
        if let Some(v) = lookup(vars::KB_USER_AGENT) {
            self.http.user_agent = v;
        }

        if let Some(v) = parse_value(vars::KB_MAX_RETRIES, lookup(vars::KB_MAX_RETRIES))? {
            self.retry.max_retries = v;
        }
        if let Some(v) = secs(vars::KB_RETRY_BASE_DELAY)? {
            self.retry.base_delay_secs = v;
        }
        if let Some(v) = secs(vars::KB_RETRY_MAX_DELAY)? {
            self.retry.max_delay_secs = v;
        }

        if let Some(v) = parse_bool(lookup(vars::KB_CACHE_ENABLED)) {
            self.cache.enabled = v;
        }
        if let Some(v) = parse_value(vars::KB_CACHE_TTL, lookup(vars::KB_CACHE_TTL))? {
            self.cache.ttl_secs = v;
        }
        if let Some(v) = parse_value(vars::KB_CACHE_MAX_SIZE, lookup(vars::KB_CACHE_MAX_SIZE))? {
            self.cache.max_size = v;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_parsing() {
        for (value, expected) in [("true", true), ("1", true), ("YES", true), ("False", false), ("off", false)] {
            assert_eq!(parse_bool(Some(value.to_string())), Some(expected), "{value}");
        }
        assert_eq!(parse_bool(None), None);
    }

    #[test]
    fn test_secs_rejects_negative_and_nan() {
        assert!(parse_secs("KB_TEST_SECS", Some("-1.5".to_string())).is_err());
        assert!(parse_secs("KB_TEST_SECS", Some("NaN".to_string())).is_err());
        assert_eq!(parse_secs("KB_TEST_SECS", Some("2.5".to_string())).unwrap(), Some(2.5));
        assert_eq!(parse_secs("KB_TEST_SECS", None).unwrap(), None);
    }

    #[test]
    fn test_dotenv_files_are_loaded_from_dir() {
        let dir = kb_test_utils::temp_dir();
        std::fs::write(
            dir.path().join(".env"),
            "KB_TEST_DOTENV_BASE=from-env\nKB_TEST_DOTENV_SHARED=from-env\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(".env.local"),
            "KB_TEST_DOTENV_LOCAL=from-local\nKB_TEST_DOTENV_SHARED=from-local\n",
        )
        .unwrap();

        let loaded = Environment::init_in(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(Environment::get("KB_TEST_DOTENV_BASE").as_deref(), Some("from-env"));
        assert_eq!(Environment::get("KB_TEST_DOTENV_LOCAL").as_deref(), Some("from-local"));
        // The first file to set a variable wins.
        assert_eq!(Environment::get("KB_TEST_DOTENV_SHARED").as_deref(), Some("from-env"));

        for var in ["KB_TEST_DOTENV_BASE", "KB_TEST_DOTENV_LOCAL", "KB_TEST_DOTENV_SHARED"] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_dotenv_missing_files_are_skipped() {
        let dir = kb_test_utils::temp_dir();
        assert!(Environment::init_in(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_dotenv_parse_error_is_reported() {
        let dir = kb_test_utils::temp_dir();
        std::fs::write(dir.path().join(".env"), "KB_TEST_DOTENV_BROKEN 'unterminated\n").unwrap();

        match Environment::init_in(dir.path()).unwrap_err() {
            EnvError::DotenvError { path, .. } => assert!(path.ends_with(".env")),
            other => panic!("Expected DotenvError, got {other:?}"),
        }
    }

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |var: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == var)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_overrides_apply_every_option() {
        let mut config = GatewayConfig::default();
        config
            .apply_overrides(lookup(&[
                ("KB_HTTP_TIMEOUT", "12.5"),
                ("KB_CONNECT_TIMEOUT", "3"),
                ("KB_USER_AGENT", "test-agent/1.0"),
                ("KB_MAX_RETRIES", "5"),
                ("KB_RETRY_BASE_DELAY", "0.25"),
                ("KB_RETRY_MAX_DELAY", "4"),
                ("KB_CACHE_ENABLED", "false"),
                ("KB_CACHE_TTL", "60"),
                ("KB_CACHE_MAX_SIZE", "50"),
            ]))
            .unwrap();

        assert_eq!(config.http.timeout_secs, 12.5);
        assert_eq!(config.http.connect_timeout_secs, 3.0);
        assert_eq!(config.http.user_agent, "test-agent/1.0");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_secs, 0.25);
        assert_eq!(config.retry.max_delay_secs, 4.0);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_size, 50);
    }

    #[test]
    fn test_overrides_leave_unset_fields() {
        let mut config = GatewayConfig::default();
        config.apply_overrides(lookup(&[("KB_MAX_RETRIES", "0")])).unwrap();
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.base_delay_secs, 1.0);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_overrides_reject_garbage() {
        let mut config = GatewayConfig::default();
        let err = config
            .apply_overrides(lookup(&[("KB_CACHE_MAX_SIZE", "lots")]))
            .unwrap_err();
        match err {
            EnvError::InvalidValue { var, .. } => assert_eq!(var, "KB_CACHE_MAX_SIZE"),
            other => panic!("Expected InvalidValue, got {other:?}"),
        }

        let err = config
            .apply_overrides(lookup(&[("KB_RETRY_BASE_DELAY", "-1")]))
            .unwrap_err();
        assert!(err.to_string().contains("KB_RETRY_BASE_DELAY"));
    }

    #[test]
    fn test_all_variable_names_are_prefixed() {
        for name in [
            vars::KB_HTTP_TIMEOUT,
            vars::KB_CONNECT_TIMEOUT,
            vars::KB_USER_AGENT,
            vars::KB_MAX_RETRIES,
            vars::KB_RETRY_BASE_DELAY,
            vars::KB_RETRY_MAX_DELAY,
            vars::KB_CACHE_ENABLED,
            vars::KB_CACHE_TTL,
            vars::KB_CACHE_MAX_SIZE,
            vars::KB_CONFIG_PATH,
            vars::KB_ENV,
        ] {
            assert!(name.starts_with("KB_"));
        }
    }
}
