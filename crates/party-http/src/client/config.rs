//! Configuration for the party service client.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://party-service-prod.ol.epicgames.com";

/// Configuration for the party service client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service origin, without the `/party/api/v1/...` prefix.
    pub base_url: String,
    /// Product segment of the API path.
    pub namespace: String,
    /// Bearer token sent with every request. Empty sends none.
    pub auth_token: String,
    /// Maximum retries for transient failures.
    pub max_retries: u32,
    /// Base retry delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Connection timeout in seconds.
    pub connection_timeout_secs: u64,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Proxy URL (optional).
    pub proxy_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            namespace: "Fortnite".to_string(),
            auth_token: String::new(),
            max_retries: 3,
            retry_delay_ms: 1000,
            connection_timeout_secs: 30,
            request_timeout_ms: 30000,
            proxy_url: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.namespace, "Fortnite");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.connection_timeout_secs, 30);
        assert_eq!(config.request_timeout_ms, 30000);
        assert!(config.auth_token.is_empty());
        assert_eq!(config.proxy_url, "");
    }

    #[test]
    fn test_partial_override() {
        let config = ClientConfig {
            max_retries: 10,
            ..Default::default()
        };
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "http://localhost:9000", "auth_token": "t"}"#)
                .unwrap();
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.auth_token, "t");
        assert_eq!(config.request_timeout_ms, 30000);
    }

    #[test]
    fn test_debug() {
        let config = ClientConfig::default();
        let debug = format!("{:?}", config);
        assert!(debug.contains("ClientConfig"));
        assert!(debug.contains("max_retries"));
    }
}
