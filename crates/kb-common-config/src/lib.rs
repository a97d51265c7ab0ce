//! Configuration types for the KB gateway.
//!
//! Settings come from built-in defaults, an optional `kb-gateway.yaml`, and
//! `KB_*` environment variables, in that order of precedence (environment
//! wins).

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_values() {
        let config = GatewayConfig::default();

        assert_eq!(config.http.timeout_secs, 30.0);
        assert_eq!(config.http.connect_timeout_secs, 10.0);
        assert!(config.http.user_agent.starts_with("KB-MCP-Server/"));

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_secs, 1.0);
        assert_eq!(config.retry.max_delay_secs, 30.0);

        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.cache.max_size, 1000);
    }

    #[test]
    fn test_config_serializes_to_yaml() {
        let yaml = serde_yaml::to_string(&GatewayConfig::default()).unwrap();
        assert!(yaml.contains("http:"));
        assert!(yaml.contains("retry:"));
        assert!(yaml.contains("cache:"));
        assert!(yaml.contains("max_retries: 3"));
    }

    #[test]
    fn test_partial_config_merges_with_defaults() {
        let partial = r#"
retry:
  max_retries: 5
cache:
  enabled: false
"#;
        let config: GatewayConfig = serde_yaml::from_str(partial).unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert!(!config.cache.enabled);

        assert_eq!(config.retry.base_delay_secs, 1.0);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.http.timeout_secs, 30.0);
    }
}
