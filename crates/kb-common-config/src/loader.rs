//! Configuration file loading and validation.

use crate::env::{vars, EnvError, Environment};
use crate::types::GatewayConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// File name looked up in the configuration directory.
pub const CONFIG_FILE_NAME: &str = "kb-gateway.yaml";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },

    #[error(transparent)]
    Env(#[from] EnvError),
}

/// Configuration loader.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Loader for `kb-gateway.yaml` inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CONFIG_FILE_NAME),
        }
    }

    /// Loader for an explicit file path.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loader honouring `KB_CONFIG_PATH`, falling back to the working directory.
    pub fn from_env() -> Self {
        match Environment::get(vars::KB_CONFIG_PATH) {
            Some(path) => Self::from_file(path),
            None => Self::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// `.env` files next to the config file, then file settings (or
    /// defaults), then `KB_*` overrides, then validation.
    pub fn load(&self) -> Result<GatewayConfig, ConfigError> {
        Environment::init_in(self.dir())?;
        self.load_with(|var| std::env::var(var).ok())
    }

    /// Like [`ConfigLoader::load`], with overrides read from `lookup` and no
    /// `.env` loading.
    pub fn load_with<F>(&self, lookup: F) -> Result<GatewayConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.load_file()?;
        config.apply_overrides(lookup)?;
        validate(&config)?;
        tracing::debug!(path = %self.path.display(), "Loaded gateway configuration");
        Ok(config)
    }

    /// Settings from the file alone; defaults when the file does not exist.
    pub fn load_file(&self) -> Result<GatewayConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(GatewayConfig::default());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let expanded = expand_env_vars(&contents, |var| std::env::var(var).ok())?;

        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }

    /// Write `config` to the loader's path.
    pub fn save(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(&self.path, yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is valid")
    })
}

/// Expand `${VAR}` and `${VAR:-default}` using `lookup`.
pub fn expand_env_vars<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut last = 0;

    for cap in env_var_pattern().captures_iter(content) {
        let Some(full) = cap.get(0) else { continue };
        let var_name = &cap[1];
        let default = cap.get(2).map(|m| m.as_str());

        let value = match lookup(var_name) {
            Some(v) => v,
            None => match default {
                Some(d) => d.to_string(),
                None => {
                    return Err(ConfigError::EnvVarNotFound {
                        var: var_name.to_string(),
                    })
                }
            },
        };

        result.push_str(&content[last..full.start()]);
        result.push_str(&value);
        last = full.end();
    }

    result.push_str(&content[last..]);
    Ok(result)
}

/// Semantic checks serde cannot express.
pub fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    let invalid = |message: &str| {
        Err(ConfigError::ValidationError {
            message: message.to_string(),
        })
    };

    let seconds = [
        ("http.timeout_secs", config.http.timeout_secs),
        ("http.connect_timeout_secs", config.http.connect_timeout_secs),
        ("http.pool_idle_timeout_secs", config.http.pool_idle_timeout_secs),
        ("retry.base_delay_secs", config.retry.base_delay_secs),
        ("retry.max_delay_secs", config.retry.max_delay_secs),
    ];
    for (name, value) in seconds {
        if !value.is_finite() || value < 0.0 {
            return invalid(&format!("{name} must be a non-negative number"));
        }
    }

    if config.http.timeout_secs == 0.0 {
        return invalid("http.timeout_secs must be greater than 0");
    }

    if config.retry.max_delay_secs < config.retry.base_delay_secs {
        return invalid("retry.max_delay_secs must not be below retry.base_delay_secs");
    }

    if config.http.user_agent.trim().is_empty() {
        return invalid("http.user_agent must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_test_utils::{temp_dir, temp_file};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_defaults_when_no_file() {
        let dir = temp_dir();
        let loader = ConfigLoader::new(dir.path());
        let config = loader.load_file().unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let content = r#"
http:
  timeout_secs: 15
  user_agent: "kb-test/0.1"
retry:
  max_retries: 1
  base_delay_secs: 0.5
cache:
  ttl_secs: 120
"#;
        let (_dir, path) = temp_file(CONFIG_FILE_NAME, content);

        let config = ConfigLoader::from_file(path).load_file().unwrap();
        assert_eq!(config.http.timeout_secs, 15.0);
        assert_eq!(config.http.user_agent, "kb-test/0.1");
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.base_delay_secs, 0.5);
        assert_eq!(config.cache.ttl_secs, 120);

        // Unspecified values use defaults.
        assert_eq!(config.http.connect_timeout_secs, 10.0);
        assert_eq!(config.retry.max_delay_secs, 30.0);
        assert_eq!(config.cache.max_size, 1000);
    }

    #[test]
    fn test_env_var_expansion() {
        let lookup = |var: &str| (var == "KB_TEST_AGENT").then(|| "agent/2".to_string());
        let result = expand_env_vars("user_agent: ${KB_TEST_AGENT}", lookup).unwrap();
        assert_eq!(result, "user_agent: agent/2");
    }

    #[test]
    fn test_env_var_default() {
        let result = expand_env_vars("ttl_secs: ${KB_TEST_MISSING:-60}", no_env).unwrap();
        assert_eq!(result, "ttl_secs: 60");
    }

    #[test]
    fn test_env_var_missing_error() {
        match expand_env_vars("key: ${KB_TEST_MISSING_VAR}", no_env).unwrap_err() {
            ConfigError::EnvVarNotFound { var } => assert_eq!(var, "KB_TEST_MISSING_VAR"),
            other => panic!("Expected EnvVarNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_multiple_env_vars_in_single_value() {
        let lookup = |var: &str| match var {
            "A" => Some("kb".to_string()),
            "B" => Some("gateway".to_string()),
            _ => None,
        };
        let result = expand_env_vars("user_agent: ${A}-${B}/${C:-1.0}", lookup).unwrap();
        assert_eq!(result, "user_agent: kb-gateway/1.0");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = GatewayConfig::default();
        config.retry.base_delay_secs = 10.0;
        config.retry.max_delay_secs = 5.0;
        match validate(&config).unwrap_err() {
            ConfigError::ValidationError { message } => assert!(message.contains("max_delay_secs")),
            other => panic!("Expected ValidationError, got {other:?}"),
        }

        let mut config = GatewayConfig::default();
        config.http.connect_timeout_secs = -1.0;
        assert!(validate(&config).is_err());

        let mut config = GatewayConfig::default();
        config.http.timeout_secs = 0.0;
        assert!(validate(&config).is_err());

        let mut config = GatewayConfig::default();
        config.http.user_agent = "  ".to_string();
        assert!(validate(&config).is_err());

        assert!(validate(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_ttl_and_size_are_valid() {
        let mut config = GatewayConfig::default();
        config.cache.ttl_secs = 0;
        config.cache.max_size = 0;
        config.retry.max_retries = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_parse_error_with_line_number() {
        let bad_yaml = r#"
retry:
  max_retries: 3
  invalid_yaml: [unclosed
"#;
        let (_dir, path) = temp_file(CONFIG_FILE_NAME, bad_yaml);

        match ConfigLoader::from_file(path).load_file().unwrap_err() {
            ConfigError::ParseError { line, .. } => assert!(line.is_some()),
            other => panic!("Expected ParseError with line number, got {other:?}"),
        }
    }

    #[test]
    fn test_load_validates_file_settings() {
        let content = "retry:\n  base_delay_secs: 20\n  max_delay_secs: 2\n";
        let (dir, _path) = temp_file(CONFIG_FILE_NAME, content);

        match ConfigLoader::new(dir.path()).load().unwrap_err() {
            ConfigError::ValidationError { message } => assert!(message.contains("retry")),
            other => panic!("Expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn test_overrides_win_over_file() {
        let (_dir, path) = temp_file(CONFIG_FILE_NAME, "cache:\n  ttl_secs: 120\n  max_size: 10\n");
        let lookup = |var: &str| (var == vars::KB_CACHE_TTL).then(|| "30".to_string());

        let config = ConfigLoader::from_file(path).load_with(lookup).unwrap();
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.cache.max_size, 10);
    }

    #[test]
    fn test_overrides_are_validated() {
        let dir = temp_dir();
        let lookup = |var: &str| (var == vars::KB_HTTP_TIMEOUT).then(|| "0".to_string());

        match ConfigLoader::new(dir.path()).load_with(lookup).unwrap_err() {
            ConfigError::ValidationError { message } => assert!(message.contains("timeout_secs")),
            other => panic!("Expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn test_load_reads_dotenv_next_to_config() {
        let (dir, _path) = temp_file(".env", "KB_USER_AGENT=dotenv-agent/1.0\n");

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        std::env::remove_var(vars::KB_USER_AGENT);
        assert_eq!(config.http.user_agent, "dotenv-agent/1.0");
    }

    #[test]
    fn test_load_reports_broken_dotenv() {
        let (dir, _path) = temp_file(".env", "KB_TEST_LOADER_BROKEN 'unterminated\n");

        match ConfigLoader::new(dir.path()).load().unwrap_err() {
            ConfigError::Env(EnvError::DotenvError { .. }) => {}
            other => panic!("Expected DotenvError, got {other:?}"),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = temp_dir();
        let loader = ConfigLoader::from_file(dir.path().join("nested/gateway.yaml"));

        let mut config = GatewayConfig::default();
        config.cache.max_size = 42;
        config.http.user_agent = "saved/1.0".to_string();
        loader.save(&config).unwrap();

        assert!(loader.path().exists());
        assert_eq!(loader.load_file().unwrap(), config);
    }
}
